//! CLI for mdloc, the Markdown asset localizer.

mod commands;
mod prompt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdloc_core::config;
use std::path::PathBuf;

use commands::{run_config, run_digest, run_localize, LocalizeArgs};

/// Top-level CLI for mdloc.
#[derive(Debug, Parser)]
#[command(name = "mdloc")]
#[command(about = "mdloc: download and localize remote images in Markdown trees", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Localize a Markdown file or every Markdown file under a folder.
    Run {
        /// Source folder or `.md` file. Prompted for when omitted.
        path: Option<PathBuf>,
        /// Do not ask before writing into an existing destination.
        #[arg(long, short = 'y')]
        yes: bool,
        /// Write everything directly into the destination instead of part_N folders.
        #[arg(long)]
        no_partition: bool,
        /// Override the permit gate capacity (concurrent normal-size assets).
        #[arg(long, value_name = "N")]
        permits: Option<usize>,
    },

    /// Print the content address used as the local filename for a URL.
    Digest {
        /// Remote asset URL.
        url: String,
    },

    /// Show the config file path and effective settings.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                path,
                yes,
                no_partition,
                permits,
            } => {
                run_localize(
                    &cfg,
                    LocalizeArgs {
                        path,
                        yes,
                        no_partition,
                        permits,
                    },
                )
                .await?
            }
            CliCommand::Digest { url } => run_digest(&url)?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
