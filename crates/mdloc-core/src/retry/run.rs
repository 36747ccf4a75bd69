use std::time::{Duration, Instant};

use super::classify;
use super::policy::RetryPolicy;
use crate::fetch::FetchError;

/// Shortest attempt worth starting once the budget is nearly spent.
const MIN_ATTEMPT: Duration = Duration::from_millis(100);

/// Calls `f` until it succeeds, fails permanently, attempts run out, or the
/// overall `budget` is spent. `f` receives the time left for its attempt.
/// Sleeps the calling thread between attempts, so run it on the blocking pool.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, budget: Duration, mut f: F) -> Result<T, FetchError>
where
    F: FnMut(Duration) -> Result<T, FetchError>,
{
    let deadline = Instant::now() + budget;
    let mut attempt = 1u32;
    let mut remaining = budget;
    loop {
        let err = match f(remaining) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let Some(delay) = policy.backoff(attempt, classify::transient(&err)) else {
            return Err(err);
        };
        let left = deadline.saturating_duration_since(Instant::now());
        if left < delay + MIN_ATTEMPT {
            tracing::debug!(attempt, error = %err, "asset GET failed, time budget spent");
            return Err(err);
        }
        tracing::debug!(
            attempt,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "asset GET failed, retrying"
        );
        std::thread::sleep(delay);
        remaining = deadline.saturating_duration_since(Instant::now());
        attempt += 1;
    }
}
