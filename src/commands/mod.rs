//! Subcommand adapters: load configuration, set up logging and the report
//! sink, then hand over to the orchestration layer.
pub mod completions;
pub mod configure;
pub mod connect;
pub mod disconnect;
pub mod status;
pub mod version;

use std::io::{self, Stdout};

use crate::cli::{Cli, Command, ConfigureCommand, GlobalOpts};
use crate::config::Config;
use crate::context::Context;
use crate::error::{PreconditionError, RhcError};
use crate::logging::{self, LogSettings};
use crate::platform;
use crate::report::{ExitStatus, HostInfo, NoPrompt, Prompter, ReportBuilder, TerminalPrompter, table};

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Context over the real collaborators.
    pub ctx: Context,
    /// Host name and uid.
    pub host: HostInfo,
    /// Output sink on stdout.
    pub report: ReportBuilder<Stdout>,
    /// Prompts may be shown.
    pub interactive: bool,
}

impl CommandSetup {
    /// Load the configuration, initialise logging and build the context.
    ///
    /// # Errors
    ///
    /// Returns an error if `--log-level` is invalid, the configuration file
    /// cannot be loaded, or the feature registry is invalid.
    pub fn init(global: &GlobalOpts, command: &str) -> Result<Self, RhcError> {
        if let Some(level) = &global.log_level
            && level.parse::<tracing::Level>().is_err()
        {
            return Err(PreconditionError::InvalidArguments(format!(
                "invalid log level '{level}'"
            ))
            .into());
        }
        let config = Config::load(&global.config)?.with_log_level(global.log_level.clone());

        let mode = global.output_mode();
        let terminal = platform::stdout_is_terminal();
        let colored = terminal && !global.no_color && !platform::no_color_env();
        logging::init_subscriber(&LogSettings {
            command: command.to_string(),
            level: config.level(),
            dir: logging::log_dir(config.log_dir.as_deref(), platform::is_root()),
            verbose: global.verbose,
            colored: !global.no_color && !platform::no_color_env(),
        });
        tracing::debug!("command '{command}' started");

        let ctx = Context::system(config)?;
        let report = ReportBuilder::new(io::stdout(), mode)
            .with_color(colored)
            .with_animation(terminal)
            .with_verbose(global.verbose)
            .with_width(table::terminal_width());
        Ok(Self {
            ctx,
            host: platform::host_info(),
            report,
            interactive: platform::is_interactive() && !mode.is_machine(),
        })
    }

    fn prompter(&self) -> Box<dyn Prompter> {
        if self.interactive {
            Box::new(TerminalPrompter::new())
        } else {
            Box::new(NoPrompt)
        }
    }
}

/// Run the parsed command line.
///
/// # Errors
///
/// Returns the error that aborted the command. Step failures inside a
/// connect or disconnect are not errors; they are reported and turned into
/// [`ExitStatus::Failure`].
pub fn run(cli: Cli) -> Result<ExitStatus, RhcError> {
    match &cli.command {
        Command::Version => return Ok(version::run(&mut io::stdout())),
        Command::Completions(opts) => return Ok(completions::run(opts.shell, &mut io::stdout())),
        _ => {}
    }

    let mut setup = CommandSetup::init(&cli.global, cli.command.name())?;
    let mut prompter = setup.prompter();
    let CommandSetup {
        ctx,
        host,
        report,
        interactive,
    } = &mut setup;

    match &cli.command {
        Command::Connect(opts) => connect::run(ctx, host, opts, report, prompter.as_mut(), *interactive),
        Command::Disconnect => disconnect::run(ctx, host, report),
        Command::Status => Ok(status::run(ctx, host, report)),
        Command::Configure(opts) => match &opts.command {
            ConfigureCommand::Features(features) => configure::run(ctx, features, report),
        },
        Command::Version | Command::Completions(_) => Ok(ExitStatus::Success),
    }
}
