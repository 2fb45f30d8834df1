//! Command-line definitions parsed with clap.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config;
use crate::report::OutputMode;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "rhc",
    about = "Connect this system to Red Hat subscription, analytics and remote management",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Machine-readable output formats.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// A single JSON document written when the command finishes
    Json,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Print a machine-readable document instead of progress lines
    #[arg(short, long, global = true, value_enum)]
    pub format: Option<Format>,

    /// Disable colored output (also honors NO_COLOR)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file
    #[arg(long, global = true, default_value = config::DEFAULT_PATH)]
    pub config: PathBuf,

    /// Log level for the log file (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Print step durations and mirror log events to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalOpts {
    /// Output mode selected by `--format`.
    #[must_use]
    pub const fn output_mode(&self) -> OutputMode {
        match self.format {
            Some(Format::Json) => OutputMode::Machine,
            None => OutputMode::Human,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect the system to Red Hat
    Connect(ConnectOpts),
    /// Disconnect the system from Red Hat
    Disconnect,
    /// Show the connection status of the system
    Status,
    /// Configure connection settings
    Configure(ConfigureOpts),
    /// Generate shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Subcommand name, as written into the log header.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Disconnect => "disconnect",
            Self::Status => "status",
            Self::Configure(_) => "configure",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Options for the `connect` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct ConnectOpts {
    /// Register with this user name
    #[arg(short, long)]
    pub username: Option<String>,

    /// Register with this password
    #[arg(short, long)]
    pub password: Option<String>,

    /// Register into this organization
    #[arg(short, long)]
    pub organization: Option<String>,

    /// Register with this activation key (repeatable)
    #[arg(short, long = "activation-key", value_name = "KEY")]
    pub activation_keys: Vec<String>,

    /// Enable a feature (repeatable)
    #[arg(short, long = "enable-feature", value_name = "FEATURE", value_delimiter = ',')]
    pub enable_features: Vec<String>,

    /// Disable a feature (repeatable)
    #[arg(short, long = "disable-feature", value_name = "FEATURE", value_delimiter = ',')]
    pub disable_features: Vec<String>,

    /// Register into this content template (repeatable)
    #[arg(short, long = "content-template", value_name = "TEMPLATE")]
    pub content_templates: Vec<String>,
}

/// Options for the `configure` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ConfigureOpts {
    /// What to configure.
    #[command(subcommand)]
    pub command: ConfigureCommand,
}

/// `configure` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigureCommand {
    /// Show or change feature preferences
    #[command(subcommand)]
    Features(FeaturesCommand),
}

/// `configure features` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum FeaturesCommand {
    /// List features and whether they are enabled
    Show,
    /// Enable features and everything they require
    Enable(FeatureArgs),
    /// Disable features and everything depending on them
    Disable(FeatureArgs),
}

/// Feature ids given to `configure features enable|disable`.
#[derive(Parser, Debug, Clone)]
pub struct FeatureArgs {
    /// Feature ids
    #[arg(required = true, value_name = "FEATURE")]
    pub features: Vec<String>,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn connect_opts(cli: Cli) -> ConnectOpts {
        match cli.command {
            Command::Connect(opts) => opts,
            other => panic!("expected connect, got {other:?}"),
        }
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_connect_with_credentials() {
        let cli = Cli::parse_from(["rhc", "connect", "-u", "jdoe", "-p", "secret", "-o", "acme"]);
        let opts = connect_opts(cli);
        assert_eq!(opts.username.as_deref(), Some("jdoe"));
        assert_eq!(opts.password.as_deref(), Some("secret"));
        assert_eq!(opts.organization.as_deref(), Some("acme"));
    }

    #[test]
    fn parse_repeated_activation_keys() {
        let cli = Cli::parse_from(["rhc", "connect", "-o", "acme", "-a", "one", "--activation-key", "two"]);
        assert_eq!(connect_opts(cli).activation_keys, vec!["one", "two"]);
    }

    #[test]
    fn parse_feature_lists() {
        let cli = Cli::parse_from([
            "rhc",
            "connect",
            "-e",
            "content",
            "--disable-feature",
            "analytics,remote-management",
        ]);
        let opts = connect_opts(cli);
        assert_eq!(opts.enable_features, vec!["content"]);
        assert_eq!(opts.disable_features, vec!["analytics", "remote-management"]);
    }

    #[test]
    fn format_json_selects_machine_mode() {
        let cli = Cli::parse_from(["rhc", "status", "--format", "json"]);
        assert_eq!(cli.global.output_mode(), OutputMode::Machine);
        let cli = Cli::parse_from(["rhc", "status"]);
        assert_eq!(cli.global.output_mode(), OutputMode::Human);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["rhc", "status", "--format", "yaml"]).is_err());
    }

    #[test]
    fn config_defaults_to_etc() {
        let cli = Cli::parse_from(["rhc", "disconnect"]);
        assert_eq!(cli.global.config, PathBuf::from("/etc/rhc/config.toml"));
        assert!(matches!(cli.command, Command::Disconnect));
    }

    #[test]
    fn parse_configure_features() {
        let cli = Cli::parse_from(["rhc", "configure", "features", "enable", "analytics"]);
        let Command::Configure(ConfigureOpts {
            command: ConfigureCommand::Features(FeaturesCommand::Enable(args)),
        }) = cli.command
        else {
            panic!("expected configure features enable");
        };
        assert_eq!(args.features, vec!["analytics"]);
    }

    #[test]
    fn configure_enable_requires_a_feature() {
        assert!(Cli::try_parse_from(["rhc", "configure", "features", "enable"]).is_err());
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["rhc", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Command::Completions(CompletionsOpts {
                shell: clap_complete::Shell::Bash
            })
        ));
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["rhc", "status", "-v", "--no-color", "--log-level", "debug"]);
        assert!(cli.global.verbose);
        assert!(cli.global.no_color);
        assert_eq!(cli.global.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.command.name(), "status");
    }
}
