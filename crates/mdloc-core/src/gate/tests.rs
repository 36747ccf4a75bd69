use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;

const SETTLE: Duration = Duration::from_secs(5);

/// Yield until `n` requests are queued on the gate.
async fn wait_for_waiters(gate: &WeightedSemaphore, n: usize) {
    timeout(SETTLE, async {
        while gate.waiting() < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("requests never queued");
}

#[tokio::test]
async fn acquire_and_release_track_available() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    assert_eq!(gate.capacity(), 5);
    let a = gate.acquire(2).await.unwrap();
    assert_eq!(gate.available(), 3);
    let b = gate.acquire(3).await.unwrap();
    assert_eq!(gate.available(), 0);
    drop(a);
    assert_eq!(gate.available(), 2);
    drop(b);
    assert_eq!(gate.available(), 5);
}

#[tokio::test]
async fn oversized_and_zero_requests_fail_fast() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    assert_eq!(
        gate.acquire(6).await.unwrap_err(),
        AcquireError::ExceedsCapacity {
            requested: 6,
            capacity: 5
        }
    );
    assert_eq!(gate.acquire(0).await.unwrap_err(), AcquireError::Zero);
    assert_eq!(gate.waiting(), 0);
    assert_eq!(gate.available(), 5);
}

#[test]
fn capacity_invariant_over_scripted_sequence() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    let mut held: Vec<Permit> = Vec::new();
    fn check(gate: &WeightedSemaphore, held: &[Permit]) {
        let sum: usize = held.iter().map(Permit::count).sum();
        assert_eq!(sum + gate.available(), gate.capacity());
    }

    for (step, count) in [1usize, 2, 1, 3, 1, 5, 2].into_iter().enumerate() {
        match gate.try_acquire(count).unwrap() {
            Some(p) => held.push(p),
            None => {
                // Make room from the oldest holder and try again.
                held.remove(0);
                check(&gate, &held);
                if let Some(p) = gate.try_acquire(count).unwrap() {
                    held.push(p);
                }
            }
        }
        check(&gate, &held);
        if step % 3 == 2 {
            held.pop();
            check(&gate, &held);
        }
    }
    held.clear();
    assert_eq!(gate.available(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_holders_never_exceed_capacity() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    let in_use = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for i in 0..64usize {
        let gate = Arc::clone(&gate);
        let in_use = Arc::clone(&in_use);
        let weight = i % 5 + 1;
        handles.push(tokio::spawn(async move {
            let permit = gate.acquire(weight).await.unwrap();
            let now = in_use.fetch_add(weight, Ordering::SeqCst) + weight;
            assert!(now <= 5, "{} units in use", now);
            tokio::time::sleep(Duration::from_millis(1)).await;
            in_use.fetch_sub(weight, Ordering::SeqCst);
            drop(permit);
        }));
    }
    for h in handles {
        timeout(SETTLE, h).await.unwrap().unwrap();
    }
    assert_eq!(gate.available(), 5);
    assert_eq!(gate.waiting(), 0);
}

#[tokio::test]
async fn later_small_request_waits_behind_blocked_head() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    let first = gate.acquire(1).await.unwrap();
    let second = gate.acquire(1).await.unwrap();
    assert_eq!(gate.available(), 3);

    let a = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.acquire(4).await.unwrap() })
    };
    wait_for_waiters(&gate, 1).await;
    let b = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.acquire(1).await.unwrap() })
    };
    wait_for_waiters(&gate, 2).await;

    // Three units are free and B only needs one, but A is ahead of it.
    assert_eq!(gate.available(), 3);
    assert!(gate.try_acquire(1).unwrap().is_none());

    drop(first);
    let a_permit = timeout(SETTLE, a).await.unwrap().unwrap();
    assert_eq!(a_permit.count(), 4);
    assert_eq!(gate.available(), 0);
    assert_eq!(gate.waiting(), 1);
    assert!(!b.is_finished());

    drop(a_permit);
    let b_permit = timeout(SETTLE, b).await.unwrap().unwrap();
    assert_eq!(b_permit.count(), 1);
    drop(second);
    drop(b_permit);
    assert_eq!(gate.available(), 5);
}

#[tokio::test]
async fn full_capacity_request_runs_alone() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    let small = gate.acquire(1).await.unwrap();
    let big = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.acquire(5).await.unwrap() })
    };
    wait_for_waiters(&gate, 1).await;
    // Newcomers queue behind the exclusive request instead of starving it.
    assert!(gate.try_acquire(1).unwrap().is_none());
    drop(small);
    let big = timeout(SETTLE, big).await.unwrap().unwrap();
    assert_eq!(gate.available(), 0);
    drop(big);
    assert_eq!(gate.available(), 5);
}

#[tokio::test]
async fn hold_and_wait_escalation_stalls() {
    // Two holders each asking for four more units: neither can ever be
    // served. This is the shape the asset task avoids by upgrading instead.
    let gate = Arc::new(WeightedSemaphore::new(5));
    let one = gate.acquire(1).await.unwrap();
    let two = gate.acquire(1).await.unwrap();
    let g1 = Arc::clone(&gate);
    let g2 = Arc::clone(&gate);
    let stuck = timeout(Duration::from_millis(100), async move {
        tokio::join!(g1.acquire(4), g2.acquire(4))
    })
    .await;
    assert!(stuck.is_err());
    // The cancelled requests left the queue and the held units are intact.
    assert_eq!(gate.waiting(), 0);
    assert_eq!(gate.available(), 3);
    drop((one, two));
    assert_eq!(gate.available(), 5);
}

#[tokio::test]
async fn concurrent_upgrades_both_complete() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    let p1 = gate.acquire(1).await.unwrap();
    let p2 = gate.acquire(1).await.unwrap();
    assert_eq!(gate.available(), 3);

    let t1 = tokio::spawn(async move {
        let p = p1.upgrade(5).await.unwrap();
        assert_eq!(p.count(), 5);
        tokio::task::yield_now().await;
    });
    let t2 = tokio::spawn(async move {
        let p = p2.upgrade(5).await.unwrap();
        assert_eq!(p.count(), 5);
        tokio::task::yield_now().await;
    });
    timeout(SETTLE, async {
        t1.await.unwrap();
        t2.await.unwrap();
    })
    .await
    .expect("upgrades deadlocked");
    assert_eq!(gate.available(), 5);
}

#[tokio::test]
async fn upgrade_within_held_count_is_noop() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    let p = gate.acquire(3).await.unwrap();
    let p = p.upgrade(2).await.unwrap();
    assert_eq!(p.count(), 3);
    assert_eq!(gate.available(), 2);
}

#[tokio::test]
async fn upgrade_past_capacity_fails_fast_and_releases() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    let p = gate.acquire(1).await.unwrap();
    let err = p.upgrade(9).await.unwrap_err();
    assert!(matches!(err, AcquireError::ExceedsCapacity { requested: 9, .. }));
    assert_eq!(gate.available(), 5);
}

#[tokio::test]
async fn cancelled_head_unblocks_the_next_request() {
    let gate = Arc::new(WeightedSemaphore::new(5));
    let held = gate.acquire(4).await.unwrap();

    let head = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { timeout(Duration::from_millis(200), gate.acquire(3)).await })
    };
    wait_for_waiters(&gate, 1).await;
    let next = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.acquire(1).await.unwrap() })
    };
    wait_for_waiters(&gate, 2).await;

    assert!(head.await.unwrap().is_err());
    let next = timeout(SETTLE, next).await.unwrap().unwrap();
    assert_eq!(next.count(), 1);
    assert_eq!(gate.available(), 0);
    assert_eq!(gate.waiting(), 0);
    drop((held, next));
    assert_eq!(gate.available(), 5);
}

#[test]
fn forget_then_manual_release() {
    let gate = Arc::new(WeightedSemaphore::new(3));
    let p = gate.try_acquire(2).unwrap().unwrap();
    let n = p.forget();
    assert_eq!(n, 2);
    assert_eq!(gate.available(), 1);
    gate.release(n);
    assert_eq!(gate.available(), 3);
}

#[test]
fn over_release_is_clamped() {
    let gate = WeightedSemaphore::new(3);
    gate.release(10);
    assert_eq!(gate.available(), 3);
}
