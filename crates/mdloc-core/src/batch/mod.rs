//! Batch driver: localizes every document of a source tree, one at a time.
//!
//! Documents are strictly sequential. Within a document, one asset task per
//! remote reference is spawned in reference order and all of them run
//! concurrently, bounded by the shared permit gate. The rewritten document is
//! written once every task has settled, then the partition allocator is told
//! the document is complete.
//!
//! A document that an earlier run already wrote goes back to the partition
//! holding it, so re-running into a populated destination reuses its assets.
//! A failed partition measurement is logged and the run goes on.

mod progress;

pub use progress::BatchEvent;

use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::config::LocalizerConfig;
use crate::document::MarkdownDocument;
use crate::partition::PartitionAllocator;
use crate::runlog::{LogEntry, RunLog};
use crate::task::{fetch_asset, AssetContext, AssetRequest};
use crate::walk;

const DESTINATION_SUFFIX: &str = "_localized";
const ASSET_DIR: &str = "assets";

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("source not found: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("not a Markdown file: {}", .0.display())]
    NotMarkdown(PathBuf),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("saving run log failed: {0:#}")]
    Log(anyhow::Error),
}

/// Failure that skips one document; the run continues with the next.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
}

/// A resolved input: what to read and where the localized copy goes.
#[derive(Debug, Clone)]
pub struct BatchSource {
    pub root: PathBuf,
    pub kind: SourceKind,
    pub destination: PathBuf,
    pub documents: Vec<PathBuf>,
}

impl BatchSource {
    pub fn destination_exists(&self) -> bool {
        self.destination.exists()
    }

    /// Path of `document` relative to the source, used as its id and its
    /// location inside a partition.
    fn relative(&self, document: &Path) -> PathBuf {
        match self.kind {
            SourceKind::File => document
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| document.to_path_buf()),
            SourceKind::Directory => document
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| document.to_path_buf()),
        }
    }
}

/// Resolves a user-supplied path to a single document or a directory tree.
///
/// A directory `notes` maps to `notes_localized`; a file `dir/a.md` maps to
/// `dir/a_localized`.
pub fn resolve_source(path: &Path) -> Result<BatchSource, BatchError> {
    let root = match std::fs::canonicalize(path) {
        Ok(p) => p,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BatchError::SourceMissing(path.to_path_buf()))
        }
        Err(source) => {
            return Err(BatchError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if root.is_file() {
        if !walk::is_markdown(&root) {
            return Err(BatchError::NotMarkdown(root));
        }
        let stem = root
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = root.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(BatchSource {
            destination: parent.join(format!("{}{}", stem, DESTINATION_SUFFIX)),
            documents: vec![root.clone()],
            kind: SourceKind::File,
            root,
        });
    }

    let documents = walk::collect_markdown(&root).map_err(|source| BatchError::Io {
        path: root.clone(),
        source,
    })?;
    let mut destination = root.as_os_str().to_owned();
    destination.push(DESTINATION_SUFFIX);
    Ok(BatchSource {
        destination: PathBuf::from(destination),
        documents,
        kind: SourceKind::Directory,
        root,
    })
}

#[derive(Debug, Clone, Default)]
pub struct BatchSettings {
    /// `None` writes everything directly under the destination.
    pub partition_threshold: Option<u64>,
}

impl BatchSettings {
    pub fn from_config(cfg: &LocalizerConfig) -> Self {
        Self {
            partition_threshold: cfg.partition_threshold(),
        }
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub documents: usize,
    pub failed_documents: usize,
    /// Highest partition index that received a document.
    pub partitions: u32,
    pub log: RunLog,
    pub log_path: Option<PathBuf>,
}

struct DocumentSummary {
    assets: usize,
    failed: usize,
}

pub struct BatchDriver {
    ctx: AssetContext,
    settings: BatchSettings,
    events: Option<mpsc::Sender<BatchEvent>>,
}

impl BatchDriver {
    pub fn new(ctx: AssetContext, settings: BatchSettings) -> Self {
        Self {
            ctx,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, tx: mpsc::Sender<BatchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    async fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    pub async fn run(&self, source: &BatchSource) -> Result<BatchReport, BatchError> {
        let total = source.documents.len();
        let mut alloc = PartitionAllocator::new(&source.destination, self.settings.partition_threshold);
        let mut log = RunLog::new();
        let mut processed = 0usize;
        let mut failed_documents = 0usize;
        let mut partitions = 0u32;

        tracing::info!(
            source = %source.root.display(),
            destination = %source.destination.display(),
            documents = total,
            "batch started"
        );
        self.emit(BatchEvent::Started {
            documents: total,
            destination: source.destination.clone(),
        })
        .await;

        for (i, path) in source.documents.iter().enumerate() {
            let index = i + 1;
            let relative = source.relative(path);
            let document = relative.to_string_lossy().into_owned();
            let home = alloc.place(&relative).await;
            let partition = home.index;
            let target = home.path.join(&relative);
            self.emit(BatchEvent::DocumentStarted {
                index,
                total,
                document: document.clone(),
                partition,
            })
            .await;

            match self.process_document(path, &target, &document, &mut log).await {
                Ok(summary) => {
                    processed += 1;
                    partitions = partitions.max(partition);
                    self.emit(BatchEvent::DocumentFinished {
                        index,
                        document,
                        assets: summary.assets,
                        failed: summary.failed,
                    })
                    .await;
                }
                Err(e) => {
                    failed_documents += 1;
                    tracing::warn!(document = %document, error = %e, "document skipped");
                    log.record_document_failure(&document, e.to_string());
                    self.emit(BatchEvent::DocumentFailed {
                        index,
                        document,
                        error: e.to_string(),
                    })
                    .await;
                }
            }

            match alloc.on_document_complete().await {
                Ok(Some(next)) => {
                    self.emit(BatchEvent::PartitionRolled {
                        index: next.index,
                        path: next.path,
                    })
                    .await;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    partition = alloc.current().index,
                    error = %format!("{:#}", e),
                    "partition measure failed, keeping current partition"
                ),
            }
        }

        let log_path = log.save(&source.destination).map_err(BatchError::Log)?;
        let totals = log.totals();
        tracing::info!(
            documents = processed,
            failed_documents,
            partitions,
            assets = totals.processed,
            failed_assets = totals.failed,
            "batch finished"
        );
        self.emit(BatchEvent::Finished {
            documents: processed,
            failed_documents,
            partitions,
            totals,
        })
        .await;

        Ok(BatchReport {
            documents: processed,
            failed_documents,
            partitions,
            log,
            log_path,
        })
    }

    async fn process_document(
        &self,
        source: &Path,
        target: &Path,
        document_id: &str,
        log: &mut RunLog,
    ) -> Result<DocumentSummary, DocumentError> {
        let text = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| DocumentError::Read {
                path: source.to_path_buf(),
                source: e,
            })?;
        let mut doc = MarkdownDocument::parse(document_id, text);

        let target_dir = target.parent().map(Path::to_path_buf).unwrap_or_default();
        let asset_dir = target_dir.join(ASSET_DIR);
        let remote: Vec<(usize, String)> = doc
            .remote_references()
            .map(|(i, r)| (i, r.url.clone()))
            .collect();
        tracing::debug!(document = document_id, assets = remote.len(), "document parsed");

        let dir_to_create = if remote.is_empty() { &target_dir } else { &asset_dir };
        tokio::fs::create_dir_all(dir_to_create)
            .await
            .map_err(|e| DocumentError::CreateDir {
                path: dir_to_create.clone(),
                source: e,
            })?;

        let handles: Vec<_> = remote
            .into_iter()
            .map(|(index, url)| {
                let ctx = self.ctx.clone();
                let request = AssetRequest {
                    document_id: document_id.to_string(),
                    url: url.clone(),
                    asset_dir: asset_dir.clone(),
                };
                let handle = tokio::spawn(async move { fetch_asset(&ctx, request).await });
                (index, url, handle)
            })
            .collect();

        let mut summary = DocumentSummary {
            assets: handles.len(),
            failed: 0,
        };
        for (index, url, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join) => Err(join.into()),
            };
            let ok = result.is_ok();
            match result {
                Ok(report) => {
                    let local = format!("./{}/{}", ASSET_DIR, report.file_name);
                    doc.resolve(index, &local);
                    log.record(
                        LogEntry::success(document_id, &url, local, report.original_size, report.final_size)
                            .with_stages(report.stages)
                            .with_reused(report.reused),
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    log.record(LogEntry::failure(document_id, &url, e.to_string()));
                }
            }
            self.emit(BatchEvent::AssetSettled {
                document: document_id.to_string(),
                url,
                ok,
            })
            .await;
        }

        tokio::fs::write(target, doc.render())
            .await
            .map_err(|e| DocumentError::Write {
                path: target.to_path_buf(),
                source: e,
            })?;
        tracing::debug!(document = document_id, target = %target.display(), "document written");
        Ok(summary)
    }
}
