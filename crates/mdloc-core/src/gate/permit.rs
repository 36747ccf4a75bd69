//! RAII permit that releases its units when dropped.

use std::fmt;
use std::sync::Arc;

use super::{AcquireError, WeightedSemaphore};

/// Units held on a [`WeightedSemaphore`]. Dropping the permit releases
/// exactly the held count.
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit {
    gate: Arc<WeightedSemaphore>,
    count: usize,
}

impl Permit {
    pub(super) fn new(gate: Arc<WeightedSemaphore>, count: usize) -> Self {
        Self { gate, count }
    }

    /// Units currently held.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Detach the units from this permit without releasing them. The caller
    /// must later call [`WeightedSemaphore::release`] with the returned count.
    pub fn forget(mut self) -> usize {
        std::mem::take(&mut self.count)
    }

    /// Grow this permit to `total` units.
    ///
    /// Never waits while holding: every held unit is given back first and
    /// `total` is then requested as one atomic grant at the tail of the
    /// queue. Two tasks upgrading at the same time therefore cannot block
    /// each other. A `total` at or below the held count returns `self`
    /// unchanged. If `total` exceeds the capacity the held units are released
    /// and the error is returned without queuing.
    pub async fn upgrade(self, total: usize) -> Result<Permit, AcquireError> {
        if total <= self.count {
            return Ok(self);
        }
        let gate = Arc::clone(&self.gate);
        gate.validate(total)?;
        tracing::debug!(held = self.count, total, "re-negotiating permits");
        drop(self);
        gate.acquire(total).await
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.count > 0 {
            self.gate.release(self.count);
        }
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit").field("count", &self.count).finish()
    }
}
