//! Command: connect the host.
use std::io::Write;

use crate::cli::ConnectOpts;
use crate::context::Context;
use crate::error::{PreconditionError, RhcError};
use crate::features::builtin::CONTENT;
use crate::features::resolve;
use crate::orchestrator::{self, ConnectRequest, Direction, Registration};
use crate::report::{ExitStatus, HostInfo, Prompter, ReportBuilder};

/// Check option combinations that clap cannot express.
///
/// # Errors
///
/// Returns [`PreconditionError::InvalidArguments`] naming the offending
/// options.
pub fn validate(opts: &ConnectOpts, can_prompt: bool) -> Result<(), PreconditionError> {
    let invalid = |msg: &str| Err(PreconditionError::InvalidArguments(msg.to_string()));
    if !opts.activation_keys.is_empty() {
        if opts.username.is_some() {
            return invalid("--username and --activation-key can not be used together");
        }
        if opts.password.is_some() {
            return invalid("--password and --activation-key can not be used together");
        }
        if opts.organization.is_none() {
            return invalid("--organization is required, when --activation-key is used");
        }
    }
    let has_password = opts.username.is_some() && opts.password.is_some();
    let has_keys = !opts.activation_keys.is_empty() && opts.organization.is_some();
    if !can_prompt && !has_password && !has_keys {
        return invalid(
            "--username/--password or --organization/--activation-key are required when a machine-readable format is used",
        );
    }
    Ok(())
}

/// Build the registration from the options, asking for a missing user name
/// or password.
fn registration(opts: &ConnectOpts, prompter: &mut dyn Prompter) -> Result<Registration, RhcError> {
    let organization = opts.organization.clone().unwrap_or_default();
    if !opts.activation_keys.is_empty() {
        return Ok(Registration::ActivationKeys {
            organization,
            keys: opts.activation_keys.clone(),
        });
    }
    let ask = |e: std::io::Error| PreconditionError::InvalidArguments(format!("cannot read credentials: {e}"));
    let username = match &opts.username {
        Some(username) => username.clone(),
        None => prompter.username().map_err(ask)?,
    };
    let password = match &opts.password {
        Some(password) => password.clone(),
        None => prompter.password().map_err(ask)?,
    };
    Ok(Registration::Password {
        organization,
        username,
        password,
    })
}

/// Run the connect command.
///
/// Preconditions are checked in order: option validation, feature
/// resolution, root privileges and finally the current connection state.
///
/// # Errors
///
/// Returns an error if a precondition fails or the feature request is
/// invalid. Step failures are reported and yield [`ExitStatus::Failure`].
pub fn run<W: Write>(
    ctx: &Context,
    host: &HostInfo,
    opts: &ConnectOpts,
    report: &mut ReportBuilder<W>,
    prompter: &mut dyn Prompter,
    interactive: bool,
) -> Result<ExitStatus, RhcError> {
    validate(opts, interactive && !report.mode().is_machine())?;
    let plan = resolve(&ctx.registry, &opts.enable_features, &opts.disable_features)?;
    if !opts.content_templates.is_empty() && plan.to_disable.contains(CONTENT) {
        return Err(PreconditionError::InvalidArguments(
            "'--content-template' can not be used together with '--disable-feature content'"
                .to_string(),
        )
        .into());
    }

    if host.uid != 0 {
        let e = PreconditionError::PermissionDenied { action: "connect" };
        tracing::error!("{e}");
        report.rejected(Direction::Connect, host, &e.to_string());
        return Err(e.into());
    }

    tracing::info!("checking system connection status");
    match ctx.subscription.consumer_uuid() {
        Err(e) => return Err(PreconditionError::ConnectionProbe(e.to_string()).into()),
        Ok(uuid) if !uuid.is_empty() => {
            tracing::info!("consumer UUID is set, system is already connected");
            return Err(PreconditionError::AlreadyConnected.into());
        }
        Ok(_) => {}
    }

    let registration = registration(opts, prompter)?;
    let stored = ctx.preferences.load(&ctx.registry);
    let mut features = plan.apply(&ctx.registry, &stored);
    let reasons = ctx.registry.normalize(&mut features);
    let request = ConnectRequest {
        registration,
        content_templates: opts.content_templates.clone(),
        features,
        reasons,
    };

    let outcome = orchestrator::connect(ctx, &host.hostname, &request, report, prompter);
    Ok(report.finish_connect(host, &outcome))
}
