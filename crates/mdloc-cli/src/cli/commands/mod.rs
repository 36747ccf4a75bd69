//! CLI command handlers, one file per command.

mod config;
mod digest;
mod run;

pub use config::run_config;
pub use digest::run_digest;
pub use run::{run_localize, LocalizeArgs};
