//! Per-URL asset task: estimate weight, take permits, fetch, transcode,
//! persist, release.
//!
//! Weight is decided from a HEAD probe before anything is acquired, then
//! taken from the gate in one atomic request. If the body turns out larger
//! than the probe suggested, the permit is upgraded with
//! [`Permit::upgrade`](crate::gate::Permit::upgrade), which gives back the
//! held units before asking for the full capacity. A task therefore never
//! waits on the gate while holding units.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::LocalizerConfig;
use crate::fetch::{CurlClient, FetchError, FetchedAsset, HttpClient};
use crate::gate::{AcquireError, WeightedSemaphore};
use crate::naming;
use crate::storage;
use crate::transcode::{self, format, Stage, TranscodeError, TranscodePolicy, TransformOutcome};

/// Lifecycle of one asset task. Transitions are logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    WeightEstimated,
    PermitsHeld,
    Fetching,
    Transcoding,
    Persisting,
    Settled,
}

/// Shared by every task of a run.
#[derive(Clone)]
pub struct AssetContext {
    pub gate: Arc<WeightedSemaphore>,
    pub client: Arc<dyn HttpClient>,
    pub policy: TranscodePolicy,
    /// Declared or fetched size above which a task takes the whole gate.
    pub large_asset_bytes: u64,
}

impl AssetContext {
    pub fn new(gate: Arc<WeightedSemaphore>, client: Arc<dyn HttpClient>) -> Self {
        Self {
            gate,
            client,
            policy: TranscodePolicy::default(),
            large_asset_bytes: LocalizerConfig::default().large_asset_bytes,
        }
    }

    /// Gate, curl client and policies from `cfg`.
    pub fn from_config(cfg: &LocalizerConfig) -> Self {
        Self {
            gate: Arc::new(WeightedSemaphore::new(cfg.max_permits)),
            client: Arc::new(CurlClient::from_config(cfg)),
            policy: cfg.transcode_policy(),
            large_asset_bytes: cfg.large_asset_bytes,
        }
    }
}

impl fmt::Debug for AssetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetContext")
            .field("gate", &self.gate)
            .field("policy", &self.policy)
            .field("large_asset_bytes", &self.large_asset_bytes)
            .finish_non_exhaustive()
    }
}

/// What to fetch and where its document keeps assets.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub document_id: String,
    pub url: String,
    pub asset_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AssetReport {
    pub url: String,
    /// `<digest>.<ext>` inside the asset directory.
    pub file_name: String,
    pub local_path: PathBuf,
    pub original_size: u64,
    pub final_size: u64,
    pub stages: Vec<Stage>,
    /// The file already existed; nothing was fetched or written.
    pub reused: bool,
    /// Units held when the task settled (0 when reused).
    pub weight: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),
    #[error("write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("permit gate: {0}")]
    Gate(#[from] AcquireError),
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Units to request for an asset whose probe declared `declared` bytes.
/// Unknown sizes take one unit.
pub fn plan_weight(declared: Option<u64>, large_asset_bytes: u64, capacity: usize) -> usize {
    match declared {
        Some(size) if size > large_asset_bytes => capacity.max(1),
        _ => 1,
    }
}

pub struct AssetFetchTask {
    ctx: AssetContext,
    request: AssetRequest,
    state: TaskState,
}

impl AssetFetchTask {
    pub fn new(ctx: AssetContext, request: AssetRequest) -> Self {
        Self {
            ctx,
            request,
            state: TaskState::Idle,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn transition(&mut self, next: TaskState) {
        tracing::debug!(
            url = %self.request.url,
            from = ?self.state,
            to = ?next,
            "asset task state"
        );
        self.state = next;
    }

    /// Runs the task to completion. Permits are released on every path.
    pub async fn run(&mut self) -> Result<AssetReport, AssetError> {
        let result = self.execute().await;
        self.transition(TaskState::Settled);
        match &result {
            Ok(report) => tracing::info!(
                document = %self.request.document_id,
                url = %report.url,
                file = %report.file_name,
                original_size = report.original_size,
                final_size = report.final_size,
                reused = report.reused,
                "asset localized"
            ),
            Err(e) => tracing::warn!(
                document = %self.request.document_id,
                url = %self.request.url,
                error = %e,
                "asset failed"
            ),
        }
        result
    }

    async fn execute(&mut self) -> Result<AssetReport, AssetError> {
        let url = self.request.url.clone();
        let digest = naming::url_digest(&url);

        if let Some(report) = self.reuse_existing(&digest).await? {
            return Ok(report);
        }

        let client = Arc::clone(&self.ctx.client);
        let probe_url = url.clone();
        let declared = match tokio::task::spawn_blocking(move || client.probe(&probe_url)).await? {
            Ok(meta) => meta.content_length,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "probe failed, assuming a small asset");
                None
            }
        };
        let capacity = self.ctx.gate.capacity();
        let weight = plan_weight(declared, self.ctx.large_asset_bytes, capacity);
        tracing::debug!(url = %url, declared = ?declared, weight, "weight estimated");
        self.transition(TaskState::WeightEstimated);

        let mut permit = self.ctx.gate.acquire(weight).await?;
        self.transition(TaskState::PermitsHeld);

        self.transition(TaskState::Fetching);
        let client = Arc::clone(&self.ctx.client);
        let get_url = url.clone();
        let FetchedAsset { bytes, meta } =
            tokio::task::spawn_blocking(move || client.get(&get_url)).await??;
        let original_size = bytes.len() as u64;

        if original_size > self.ctx.large_asset_bytes && permit.count() < capacity {
            tracing::info!(
                url = %url,
                size = original_size,
                held = permit.count(),
                "asset larger than declared, upgrading to exclusive permit"
            );
            permit = permit.upgrade(capacity).await?;
        }

        self.transition(TaskState::Transcoding);
        let extension = format::resolve_extension(meta.content_type.as_deref(), &url);
        let policy = self.ctx.policy.clone();
        let outcome: TransformOutcome =
            tokio::task::spawn_blocking(move || transcode::transcode(bytes, &extension, &policy))
                .await??;

        self.transition(TaskState::Persisting);
        let file_name = format!("{}.{}", digest, outcome.extension);
        let local_path = self.request.asset_dir.join(&file_name);
        let target = local_path.clone();
        let TransformOutcome {
            bytes,
            final_size,
            stages,
            ..
        } = outcome;
        let wrote = tokio::task::spawn_blocking(move || storage::persist_if_absent(&target, &bytes))
            .await?
            .map_err(|source| AssetError::Persist {
                path: local_path.clone(),
                source,
            })?;
        if !wrote {
            tracing::debug!(path = %local_path.display(), "asset appeared concurrently, kept existing file");
        }

        let weight = permit.count();
        drop(permit);
        Ok(AssetReport {
            url,
            file_name,
            local_path,
            original_size,
            final_size,
            stages,
            reused: false,
            weight,
        })
    }

    async fn reuse_existing(&self, digest: &str) -> Result<Option<AssetReport>, AssetError> {
        let dir = self.request.asset_dir.clone();
        let stem = digest.to_string();
        let found = tokio::task::spawn_blocking(move || {
            let path = storage::find_existing(&dir, &stem)?;
            path.map(|p| std::fs::metadata(&p).map(|m| (p, m.len())))
                .transpose()
        })
        .await?;
        let (path, size) = match found {
            Ok(Some(hit)) => hit,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(
                    dir = %self.request.asset_dir.display(),
                    error = %e,
                    "asset directory scan failed, fetching"
                );
                return Ok(None);
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::debug!(url = %self.request.url, file = %file_name, "reusing existing asset");
        Ok(Some(AssetReport {
            url: self.request.url.clone(),
            file_name,
            local_path: path,
            original_size: size,
            final_size: size,
            stages: Vec::new(),
            reused: true,
            weight: 0,
        }))
    }
}

/// Convenience wrapper: build and run one task.
pub async fn fetch_asset(ctx: &AssetContext, request: AssetRequest) -> Result<AssetReport, AssetError> {
    let mut task = AssetFetchTask::new(ctx.clone(), request);
    task.run().await
}
