//! Command: show the connection status.
use std::io::Write;

use crate::context::Context;
use crate::orchestrator::probe_status;
use crate::report::{ExitStatus, HostInfo, ReportBuilder, Reporter};

/// Run the status command. Any probe not in the connected state yields
/// [`ExitStatus::Failure`].
pub fn run<W: Write>(ctx: &Context, host: &HostInfo, report: &mut ReportBuilder<W>) -> ExitStatus {
    report.text(&format!("Connection status for {}:\n\n", host.hostname));
    let status = probe_status(ctx, report);
    report.finish_status(host, &status)
}
