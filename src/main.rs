//! `rhc` command-line entry point.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use rhc_cli::cli::Cli;
use rhc_cli::commands;
use rhc_cli::report::ExitStatus;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitStatus::Usage.into()
            } else {
                ExitStatus::Success.into()
            };
        }
    };

    if let Err(e) = ctrlc::set_handler(|| {
        let _ = console::Term::stdout().show_cursor();
        std::process::exit(130);
    }) {
        tracing::debug!("cannot install interrupt handler: {e}");
    }

    match commands::run(cli) {
        Ok(status) => status.into(),
        Err(e) => {
            tracing::error!("{e}");
            let _ = writeln!(io::stderr(), "error: {e}");
            e.exit_status().into()
        }
    }
}
