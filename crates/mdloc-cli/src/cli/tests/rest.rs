//! Tests for digest and config subcommands.

use super::parse;
use clap::Parser;
use crate::cli::CliCommand;

#[test]
fn cli_parse_digest() {
    match parse(&["mdloc", "digest", "https://example.com/a.png"]) {
        CliCommand::Digest { url } => assert_eq!(url, "https://example.com/a.png"),
        _ => panic!("expected Digest"),
    }
}

#[test]
fn cli_parse_digest_requires_url() {
    assert!(crate::cli::Cli::try_parse_from(["mdloc", "digest"]).is_err());
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["mdloc", "config"]), CliCommand::Config));
}

#[test]
fn cli_requires_subcommand() {
    assert!(crate::cli::Cli::try_parse_from(["mdloc"]).is_err());
}
