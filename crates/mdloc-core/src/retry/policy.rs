use std::time::Duration;

/// A GET failure worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transient {
    /// Connect or transfer timeout.
    Timeout,
    /// 429 or 503; backs off twice as long.
    Throttled,
    /// Reset, refused, DNS, empty reply.
    Connection,
    /// Any other 5xx.
    Server(u16),
}

/// Bounded exponential backoff for asset GETs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per asset, counting the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Single attempt; used by tests and for the probe.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, or `None` to give up.
    ///
    /// `attempt` counts from 1. Permanent failures (`transient == None`) are
    /// never retried.
    pub fn backoff(&self, attempt: u32, transient: Option<Transient>) -> Option<Duration> {
        let transient = transient?;
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32 << attempt.saturating_sub(1).min(8);
        let factor = match transient {
            Transient::Throttled => factor.saturating_mul(2),
            _ => factor,
        };
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}
