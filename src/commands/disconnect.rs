//! Command: disconnect the host.
use std::io::Write;

use crate::context::Context;
use crate::error::{PreconditionError, RhcError};
use crate::orchestrator::{Direction, disconnect};
use crate::report::{ExitStatus, HostInfo, ReportBuilder};

/// Run the disconnect command.
///
/// # Errors
///
/// Returns [`PreconditionError::PermissionDenied`] for non-root callers and
/// [`PreconditionError::AlreadyDisconnected`] when every step is already
/// done and no connected marker exists.
pub fn run<W: Write>(
    ctx: &Context,
    host: &HostInfo,
    report: &mut ReportBuilder<W>,
) -> Result<ExitStatus, RhcError> {
    if host.uid != 0 {
        let e = PreconditionError::PermissionDenied {
            action: "disconnect",
        };
        tracing::error!("{e}");
        report.rejected(Direction::Disconnect, host, &e.to_string());
        return Err(e.into());
    }

    let probes = disconnect::probe(ctx);
    if probes.all_idle() && !ctx.marker.exists() {
        tracing::info!("every disconnect step is already done");
        return Err(PreconditionError::AlreadyDisconnected.into());
    }

    let outcome = disconnect::run(ctx, probes, &host.hostname, report);
    Ok(report.finish_disconnect(host, &outcome))
}
