//! Progress events sent from the batch driver to the CLI.
//!
//! Delivered over a `tokio::sync::mpsc` channel; a dropped receiver only
//! silences progress, it never stops the run.

use std::path::PathBuf;

use crate::runlog::Totals;

#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started {
        documents: usize,
        destination: PathBuf,
    },
    DocumentStarted {
        /// 1-based position in the run.
        index: usize,
        total: usize,
        document: String,
        partition: u32,
    },
    AssetSettled {
        document: String,
        url: String,
        ok: bool,
    },
    DocumentFinished {
        index: usize,
        document: String,
        assets: usize,
        failed: usize,
    },
    DocumentFailed {
        index: usize,
        document: String,
        error: String,
    },
    PartitionRolled {
        index: u32,
        path: PathBuf,
    },
    Finished {
        documents: usize,
        failed_documents: usize,
        partitions: u32,
        totals: Totals,
    },
}
