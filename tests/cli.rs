#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing,
    clippy::panic
)]
//! Integration tests for command-line parsing.

use clap::{CommandFactory, Parser};
use rhc_cli::cli::{Cli, Command, ConfigureCommand, FeaturesCommand};
use rhc_cli::report::OutputMode;

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn global_options_follow_the_subcommand() {
    let cli = Cli::try_parse_from(["rhc", "status", "--format", "json", "--no-color"]).unwrap();
    assert!(matches!(cli.command, Command::Status));
    assert_eq!(cli.global.output_mode(), OutputMode::Machine);
    assert!(cli.global.no_color);
}

#[test]
fn feature_lists_accept_commas_and_repeats() {
    let cli = Cli::try_parse_from([
        "rhc",
        "connect",
        "--disable-feature",
        "analytics,remote-management",
        "-e",
        "content",
    ])
    .unwrap();
    let Command::Connect(opts) = cli.command else {
        panic!("expected connect");
    };
    assert_eq!(opts.disable_features, vec!["analytics", "remote-management"]);
    assert_eq!(opts.enable_features, vec!["content"]);
}

#[test]
fn configure_features_enable_requires_ids() {
    assert!(Cli::try_parse_from(["rhc", "configure", "features", "enable"]).is_err());
    let cli = Cli::try_parse_from(["rhc", "configure", "features", "enable", "analytics"]).unwrap();
    let Command::Configure(opts) = cli.command else {
        panic!("expected configure");
    };
    let ConfigureCommand::Features(FeaturesCommand::Enable(args)) = opts.command else {
        panic!("expected features enable");
    };
    assert_eq!(args.features, vec!["analytics"]);
}

#[test]
fn unknown_format_is_rejected() {
    assert!(Cli::try_parse_from(["rhc", "status", "--format", "yaml"]).is_err());
}
