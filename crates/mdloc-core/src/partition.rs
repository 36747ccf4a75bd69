//! Output partitions: numbered buckets under the destination root.
//!
//! The active partition changes only between documents. After each document
//! the partition directory is measured from disk; once it reaches the
//! threshold, the next document goes to a new `part_<n+1>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const PARTITION_PREFIX: &str = "part_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// 1-based.
    pub index: u32,
    pub path: PathBuf,
    /// Size on disk as of the last measurement.
    pub last_measured: u64,
}

#[derive(Debug)]
pub struct PartitionAllocator {
    root: PathBuf,
    threshold: Option<u64>,
    current: Partition,
}

impl PartitionAllocator {
    /// With `threshold == None` everything is written directly under `root`.
    pub fn new(root: impl Into<PathBuf>, threshold: Option<u64>) -> Self {
        let root = root.into();
        let current = Partition {
            index: 1,
            path: partition_path(&root, threshold, 1),
            last_measured: 0,
        };
        Self {
            root,
            threshold,
            current,
        }
    }

    pub fn current(&self) -> &Partition {
        &self.current
    }

    pub fn current_path(&self) -> &Path {
        &self.current.path
    }

    pub fn is_partitioned(&self) -> bool {
        self.threshold.is_some()
    }

    /// Partition a document goes to. A document that an earlier run already
    /// wrote into some partition goes back there, so its assets are found
    /// again; anything else goes to the active partition.
    pub async fn place(&self, relative: &Path) -> Partition {
        if self.threshold.is_none() {
            return self.current.clone();
        }
        let root = self.root.clone();
        let rel = relative.to_path_buf();
        let home = tokio::task::spawn_blocking(move || existing_home(&root, &rel))
            .await
            .ok()
            .flatten();
        match home {
            Some(index) if index != self.current.index => {
                tracing::debug!(
                    document = %relative.display(),
                    partition = index,
                    "document already present in an earlier partition"
                );
                Partition {
                    index,
                    path: partition_path(&self.root, self.threshold, index),
                    last_measured: 0,
                }
            }
            _ => self.current.clone(),
        }
    }

    /// Re-measures the active partition and rolls over if it reached the
    /// threshold. Returns the new partition when a rollover happened.
    pub async fn on_document_complete(&mut self) -> Result<Option<Partition>> {
        let Some(threshold) = self.threshold else {
            return Ok(None);
        };
        let path = self.current.path.clone();
        let size = tokio::task::spawn_blocking(move || dir_size(&path))
            .await
            .context("partition measure join")?
            .with_context(|| format!("measure {}", self.current.path.display()))?;
        self.current.last_measured = size;
        tracing::debug!(
            partition = self.current.index,
            size,
            threshold,
            "partition measured"
        );
        if size < threshold {
            return Ok(None);
        }

        let index = self.current.index + 1;
        self.current = Partition {
            index,
            path: partition_path(&self.root, self.threshold, index),
            last_measured: 0,
        };
        tracing::info!(partition = index, previous_size = size, "partition rolled over");
        Ok(Some(self.current.clone()))
    }
}

fn partition_path(root: &Path, threshold: Option<u64>, index: u32) -> PathBuf {
    match threshold {
        Some(_) => root.join(format!("{}{}", PARTITION_PREFIX, index)),
        None => root.to_path_buf(),
    }
}

/// Index of the first existing `part_<n>` that holds `relative`. Partitions
/// are numbered without gaps, so the scan stops at the first missing one.
fn existing_home(root: &Path, relative: &Path) -> Option<u32> {
    (1u32..)
        .map(|index| (index, root.join(format!("{}{}", PARTITION_PREFIX, index))))
        .take_while(|(_, dir)| dir.is_dir())
        .find(|(_, dir)| dir.join(relative).is_file())
        .map(|(index, _)| index)
}

/// Total size of regular files under `path`. A missing path measures 0.
pub fn dir_size(path: &Path) -> io::Result<u64> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut total = 0u64;
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += dir_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
