//! `mdloc config` – show where the config lives and what is in effect.

use anyhow::Result;
use mdloc_core::config::{self, LocalizerConfig};
use mdloc_core::logging;
use mdloc_core::runlog::format_size;

pub fn run_config(cfg: &LocalizerConfig) -> Result<()> {
    println!("config file: {}", config::config_path()?.display());
    if let Ok(path) = logging::log_file_path() {
        println!("log file:    {}", path.display());
    }
    println!();
    println!("max_permits:          {}", cfg.max_permits);
    println!("large_asset_bytes:    {}", format_size(cfg.large_asset_bytes));
    println!("size_ceiling_bytes:   {}", format_size(cfg.size_ceiling_bytes));
    println!("max_width:            {}", cfg.max_width);
    println!("normalize_quality:    {}", cfg.normalize_quality);
    println!("normalize_small:      {}", cfg.normalize_small);
    match cfg.partition_threshold() {
        Some(t) => println!("partition_threshold:  {}", format_size(t)),
        None => println!("partition_threshold:  disabled"),
    }
    println!("connect_timeout:      {}s", cfg.connect_timeout().as_secs());
    println!("transfer_timeout:     {}s", cfg.transfer_timeout().as_secs());
    let retry = cfg.retry_policy();
    println!(
        "retry:                {} attempt(s), backoff {:?}..{:?}",
        retry.max_attempts, retry.base_delay, retry.max_delay
    );
    if let Some(ua) = &cfg.user_agent {
        println!("user_agent:           {}", ua);
    }
    Ok(())
}
