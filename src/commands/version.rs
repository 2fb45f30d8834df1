//! Command: print version information.
use std::io::Write;

use crate::report::ExitStatus;

/// Version string baked in at build time.
#[must_use]
pub fn version() -> &'static str {
    option_env!("RHC_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the rhc version to `out`.
pub fn run(out: &mut dyn Write) -> ExitStatus {
    match writeln!(out, "rhc {}", version()) {
        Ok(()) => ExitStatus::Success,
        Err(e) => {
            tracing::debug!("cannot write version: {e}");
            ExitStatus::Failure
        }
    }
}
