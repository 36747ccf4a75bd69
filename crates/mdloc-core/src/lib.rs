pub mod config;
pub mod logging;

pub mod batch;
pub mod document;
pub mod fetch;
pub mod gate;
pub mod naming;
pub mod partition;
pub mod retry;
pub mod runlog;
pub mod storage;
pub mod task;
pub mod transcode;
pub mod walk;
