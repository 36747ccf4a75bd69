use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::transcode::TranscodePolicy;

const MIB: u64 = 1024 * 1024;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per asset GET (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_secs: 0.5,
            max_delay_secs: 5,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/mdloc/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizerConfig {
    /// Capacity of the fetch/transcode gate. A normal asset takes one unit,
    /// an oversized asset takes all of them.
    pub max_permits: usize,
    /// Declared size above which an asset monopolizes the gate.
    pub large_asset_bytes: u64,
    /// Target size ceiling for a persisted asset; larger inputs are degraded in stages.
    pub size_ceiling_bytes: u64,
    /// Maximum width used by the resize stage (never upscales).
    pub max_width: u32,
    /// WebP quality used when normalizing assets that already fit the ceiling.
    pub normalize_quality: f32,
    /// If false, assets within the ceiling are stored as fetched.
    pub normalize_small: bool,
    /// Size at which the current output partition is closed. 0 disables partitioning.
    pub partition_threshold_bytes: u64,
    /// Connect timeout for probes and fetches.
    pub connect_timeout_secs: u64,
    /// Overall timeout for one GET transfer.
    pub transfer_timeout_secs: u64,
    /// Optional User-Agent header sent with every request.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            max_permits: 5,
            large_asset_bytes: 20 * MIB,
            size_ceiling_bytes: 10 * MIB,
            max_width: 2560,
            normalize_quality: 90.0,
            normalize_small: true,
            partition_threshold_bytes: 50 * MIB,
            connect_timeout_secs: 10,
            transfer_timeout_secs: 60,
            user_agent: None,
            retry: None,
        }
    }
}

impl LocalizerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn transcode_policy(&self) -> TranscodePolicy {
        TranscodePolicy {
            ceiling_bytes: self.size_ceiling_bytes,
            max_width: self.max_width.max(1),
            normalize_quality: self.normalize_quality.clamp(0.0, 100.0),
            normalize_small: self.normalize_small,
        }
    }

    /// Partition threshold, or `None` when partitioning is disabled.
    pub fn partition_threshold(&self) -> Option<u64> {
        (self.partition_threshold_bytes > 0).then_some(self.partition_threshold_bytes)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdloc")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<LocalizerConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = LocalizerConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: LocalizerConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = LocalizerConfig::default();
        assert_eq!(cfg.max_permits, 5);
        assert_eq!(cfg.large_asset_bytes, 20 * 1024 * 1024);
        assert_eq!(cfg.size_ceiling_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.partition_threshold(), Some(50 * 1024 * 1024));
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.transfer_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = LocalizerConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: LocalizerConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_permits, cfg.max_permits);
        assert_eq!(parsed.large_asset_bytes, cfg.large_asset_bytes);
        assert_eq!(parsed.max_width, cfg.max_width);
        assert_eq!(parsed.normalize_small, cfg.normalize_small);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_permits = 8
            large_asset_bytes = 1000
            size_ceiling_bytes = 500
            max_width = 1024
            normalize_quality = 85.0
            normalize_small = false
            partition_threshold_bytes = 0
            connect_timeout_secs = 3
            transfer_timeout_secs = 30
        "#;
        let cfg: LocalizerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_permits, 8);
        assert_eq!(cfg.partition_threshold(), None);
        assert!(cfg.user_agent.is_none());
        assert!(cfg.retry.is_none());
        let policy = cfg.transcode_policy();
        assert_eq!(policy.ceiling_bytes, 500);
        assert_eq!(policy.max_width, 1024);
        assert!(!policy.normalize_small);
    }

    #[test]
    fn config_toml_retry_section() {
        let toml = r#"
            max_permits = 5
            large_asset_bytes = 20971520
            size_ceiling_bytes = 10485760
            max_width = 2560
            normalize_quality = 90.0
            normalize_small = true
            partition_threshold_bytes = 52428800
            connect_timeout_secs = 10
            transfer_timeout_secs = 60
            user_agent = "mdloc-test"

            [retry]
            max_attempts = 4
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: LocalizerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.user_agent.as_deref(), Some("mdloc-test"));
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(15));
    }
}
