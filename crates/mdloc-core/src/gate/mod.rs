//! Weighted permit gate shared by every asset task of a run.
//!
//! A request may claim several units at once; an oversized asset claims the
//! whole capacity so it runs alone. Grants are strictly FIFO: once a request
//! is queued, nothing behind it (and no newcomer) is served until it is,
//! even if the smaller request could be satisfied right now. That rule is
//! what makes a full-capacity request at the head live: holders only ever
//! give units back while it waits.
//!
//! Waits have no timeout. A request larger than the capacity is rejected up
//! front instead of queuing forever.

mod permit;
#[cfg(test)]
mod tests;

pub use permit::Permit;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Errors returned by [`WeightedSemaphore::acquire`]. All of them indicate a
/// caller defect, never a transient condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("permit request must claim at least one unit")]
    Zero,
    #[error("requested {requested} permits but the gate capacity is {capacity}")]
    ExceedsCapacity { requested: usize, capacity: usize },
    #[error("gate dropped while a request was queued")]
    Closed,
}

/// A queued request. Destroyed on grant.
struct Waiter {
    id: u64,
    count: usize,
    grant: oneshot::Sender<()>,
}

struct GateState {
    available: usize,
    waiters: VecDeque<Waiter>,
    next_id: u64,
}

impl GateState {
    /// Grant from the head while it fits; stop at the first head that does not.
    fn drain(&mut self) {
        while self
            .waiters
            .front()
            .is_some_and(|head| head.count <= self.available)
        {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            self.available -= waiter.count;
            if waiter.grant.send(()).is_err() {
                self.available += waiter.count;
            }
        }
    }
}

/// Counting gate where one acquisition may take more than one unit.
///
/// Invariant: `available + sum(units held by live permits) == capacity`.
pub struct WeightedSemaphore {
    capacity: usize,
    state: Mutex<GateState>,
}

impl fmt::Debug for WeightedSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        f.debug_struct("WeightedSemaphore")
            .field("capacity", &self.capacity)
            .field("available", &st.available)
            .field("waiting", &st.waiters.len())
            .finish()
    }
}

impl WeightedSemaphore {
    /// Create a gate with `capacity` units (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(GateState {
                available: capacity,
                waiters: VecDeque::new(),
                next_id: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units not currently held. Non-blocking.
    pub fn available(&self) -> usize {
        self.lock().available
    }

    /// Number of queued requests.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn validate(&self, count: usize) -> Result<(), AcquireError> {
        if count == 0 {
            return Err(AcquireError::Zero);
        }
        if count > self.capacity {
            return Err(AcquireError::ExceedsCapacity {
                requested: count,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Take `count` units without waiting. Returns `Ok(None)` when the units
    /// are not free or another request is already queued.
    pub fn try_acquire(self: &Arc<Self>, count: usize) -> Result<Option<Permit>, AcquireError> {
        self.validate(count)?;
        let mut st = self.lock();
        if st.waiters.is_empty() && st.available >= count {
            st.available -= count;
            return Ok(Some(Permit::new(Arc::clone(self), count)));
        }
        Ok(None)
    }

    /// Take `count` units, waiting at the tail of the queue if they are not
    /// free or anyone is already waiting.
    ///
    /// Cancel-safe: dropping the future gives up the queue slot, and units
    /// granted concurrently with the drop are returned to the gate.
    pub async fn acquire(self: &Arc<Self>, count: usize) -> Result<Permit, AcquireError> {
        self.validate(count)?;
        let (id, rx) = {
            let mut st = self.lock();
            if st.waiters.is_empty() && st.available >= count {
                st.available -= count;
                return Ok(Permit::new(Arc::clone(self), count));
            }
            let (tx, rx) = oneshot::channel();
            let id = st.next_id;
            st.next_id += 1;
            tracing::debug!(
                requested = count,
                available = st.available,
                queued = st.waiters.len(),
                "waiting for permits"
            );
            st.waiters.push_back(Waiter {
                id,
                count,
                grant: tx,
            });
            (id, rx)
        };

        let mut pending = Pending {
            gate: self.as_ref(),
            id,
            count,
            rx,
            settled: false,
        };
        let granted = (&mut pending.rx).await;
        pending.settled = true;
        match granted {
            Ok(()) => {
                tracing::trace!(granted = count, "permits granted");
                Ok(Permit::new(Arc::clone(self), count))
            }
            Err(_) => Err(AcquireError::Closed),
        }
    }

    /// Return `count` units and wake queued requests in FIFO order.
    ///
    /// Normally called by [`Permit`]'s drop; call it directly only for units
    /// detached with [`Permit::forget`]. Over-release is clamped at capacity.
    pub fn release(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut st = self.lock();
        let restored = st.available + count;
        if restored > self.capacity {
            tracing::warn!(
                released = count,
                available = st.available,
                capacity = self.capacity,
                "permit over-release clamped"
            );
        }
        st.available = restored.min(self.capacity);
        st.drain();
    }
}

/// Queue slot owned by an in-flight `acquire`; cleans up if the future is dropped.
struct Pending<'a> {
    gate: &'a WeightedSemaphore,
    id: u64,
    count: usize,
    rx: oneshot::Receiver<()>,
    settled: bool,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut st = self.gate.lock();
        if let Some(pos) = st.waiters.iter().position(|w| w.id == self.id) {
            st.waiters.remove(pos);
            if pos == 0 {
                st.drain();
            }
        } else if self.rx.try_recv().is_ok() {
            // Granted between the wakeup and the drop.
            st.available = (st.available + self.count).min(self.gate.capacity);
            st.drain();
        }
    }
}
