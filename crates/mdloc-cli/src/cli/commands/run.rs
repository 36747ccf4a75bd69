//! `mdloc run` – localize a Markdown file or folder.

use anyhow::{bail, Context, Result};
use mdloc_core::batch::{resolve_source, BatchDriver, BatchEvent, BatchSettings, BatchSource};
use mdloc_core::config::LocalizerConfig;
use mdloc_core::task::AssetContext;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::cli::prompt;

#[derive(Debug, Clone, Default)]
pub struct LocalizeArgs {
    pub path: Option<PathBuf>,
    pub yes: bool,
    pub no_partition: bool,
    pub permits: Option<usize>,
}

pub async fn run_localize(cfg: &LocalizerConfig, args: LocalizeArgs) -> Result<()> {
    let mut cfg = cfg.clone();
    if let Some(n) = args.permits {
        cfg.max_permits = n.max(1);
    }

    let path = match args.path {
        Some(p) => p,
        None => ask_source_path()?,
    };
    let source = resolve_source(&path).with_context(|| format!("resolve {}", path.display()))?;
    if source.destination_exists() && !args.yes && !confirm_existing(&source)? {
        println!("cancelled.");
        return Ok(());
    }

    let settings = BatchSettings {
        partition_threshold: if args.no_partition {
            None
        } else {
            cfg.partition_threshold()
        },
    };
    println!("source:      {}", source.root.display());
    println!("destination: {}", source.destination.display());
    tracing::info!(
        permits = cfg.max_permits,
        partition_threshold = ?settings.partition_threshold,
        "starting run"
    );

    let (tx, rx) = tokio::sync::mpsc::channel::<BatchEvent>(64);
    let printer = tokio::spawn(print_events(rx));
    let driver = BatchDriver::new(AssetContext::from_config(&cfg), settings).with_events(tx);
    let result = driver.run(&source).await;
    drop(driver);
    let _ = printer.await;
    let report = result?;

    let totals = report.log.totals();
    println!();
    println!(
        "done: {} document(s), {} skipped, {} partition(s)",
        report.documents, report.failed_documents, report.partitions
    );
    println!(
        "assets: {} processed, {} succeeded, {} failed, {} compressed",
        totals.processed, totals.succeeded, totals.failed, totals.compressed
    );
    if let Some(log_path) = &report.log_path {
        println!("log: {}", log_path.display());
    }
    println!("output: {}", source.destination.display());
    Ok(())
}

fn ask_source_path() -> Result<PathBuf> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let raw = prompt::prompt_line(&mut input, &mut io::stdout(), "Source folder or Markdown file: ")?;
    match prompt::clean_path_input(&raw) {
        Some(p) => Ok(PathBuf::from(p)),
        None => bail!("path must not be empty"),
    }
}

fn confirm_existing(source: &BatchSource) -> Result<bool> {
    println!(
        "destination {} already exists; files with the same name will be overwritten.",
        source.destination.display()
    );
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let answer = prompt::prompt_line(&mut input, &mut io::stdout(), "Continue? (y/n): ")?;
    Ok(prompt::is_confirmed(&answer))
}

async fn print_events(mut rx: tokio::sync::mpsc::Receiver<BatchEvent>) {
    let mut out = io::stdout();
    while let Some(event) = rx.recv().await {
        let line = match event {
            BatchEvent::Started { documents, .. } => format!("{} document(s) to localize", documents),
            BatchEvent::DocumentStarted {
                index,
                total,
                document,
                partition,
            } => format!("[{}/{}] {} (part {})", index, total, document, partition),
            BatchEvent::AssetSettled { url, ok: false, .. } => format!("    failed: {}", url),
            BatchEvent::AssetSettled { .. } => continue,
            BatchEvent::DocumentFinished { assets, failed, .. } => {
                format!("    {} asset(s), {} failed", assets, failed)
            }
            BatchEvent::DocumentFailed { error, .. } => format!("    skipped: {}", error),
            BatchEvent::PartitionRolled { index, path } => {
                format!("  -> partition {} at {}", index, path.display())
            }
            BatchEvent::Finished { .. } => continue,
        };
        let _ = writeln!(out, "{}", line);
    }
    let _ = out.flush();
}
