//! Retry for asset GETs.
//!
//! Only the GET is retried; a failed HEAD probe just means the size is
//! unknown. Backoff is bounded so one flaky host cannot hold permits for long.

mod classify;
mod policy;
mod run;

pub use classify::{transient, transient_status};
pub use policy::{RetryPolicy, Transient};
pub use run::run_with_retry;
