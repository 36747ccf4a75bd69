//! Tests for the run subcommand.

use super::parse;
use clap::Parser;
use crate::cli::CliCommand;
use std::path::Path;

#[test]
fn cli_parse_run_defaults() {
    match parse(&["mdloc", "run"]) {
        CliCommand::Run {
            path,
            yes,
            no_partition,
            permits,
        } => {
            assert!(path.is_none());
            assert!(!yes);
            assert!(!no_partition);
            assert!(permits.is_none());
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_with_path_and_flags() {
    match parse(&[
        "mdloc",
        "run",
        "./notes",
        "--yes",
        "--no-partition",
        "--permits",
        "8",
    ]) {
        CliCommand::Run {
            path,
            yes,
            no_partition,
            permits,
        } => {
            assert_eq!(path.as_deref(), Some(Path::new("./notes")));
            assert!(yes);
            assert!(no_partition);
            assert_eq!(permits, Some(8));
        }
        _ => panic!("expected Run with flags"),
    }
}

#[test]
fn cli_parse_run_short_yes() {
    match parse(&["mdloc", "run", "a.md", "-y"]) {
        CliCommand::Run { yes, .. } => assert!(yes),
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_rejects_bad_permits() {
    assert!(crate::cli::Cli::try_parse_from(["mdloc", "run", "--permits", "many"]).is_err());
}
