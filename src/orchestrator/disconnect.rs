//! The disconnect sequence: services, then telemetry, then subscription.
//!
//! Unlike connect, every step runs regardless of how the others went.
use std::time::{Duration, Instant};

use super::outcome::{ConnectionOutcome, Direction, StepKind, StepStatus};
use crate::context::Context;
use crate::error::CollaboratorError;
use crate::report::{Icon, Indent, Reporter};
use crate::systemd::{self, INACTIVE};

/// Result of asking one collaborator whether it is already disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Idle {
    /// Already in the disconnected state.
    Yes,
    /// Still connected; the step has work to do.
    No,
    /// The collaborator could not be asked.
    Unknown(CollaboratorError),
}

/// Idempotency probes taken before any disconnect step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectProbes {
    /// Management service already inactive.
    pub services: Idle,
    /// Telemetry client already unregistered.
    pub telemetry: Idle,
    /// No consumer identity.
    pub subscription: Idle,
}

impl DisconnectProbes {
    /// `true` when every step is already in its target state.
    #[must_use]
    pub fn all_idle(&self) -> bool {
        [&self.services, &self.telemetry, &self.subscription]
            .iter()
            .all(|p| **p == Idle::Yes)
    }
}

/// Ask each collaborator whether its step is already done.
pub fn probe(ctx: &Context) -> DisconnectProbes {
    let unit = &ctx.config.units.management_service;
    let services = match ctx.services.unit_state(unit) {
        Ok(state) if state == INACTIVE => Idle::Yes,
        Ok(_) => Idle::No,
        Err(e) => Idle::Unknown(CollaboratorError::new(
            StepKind::Services,
            format!("unable to get state of {unit}"),
            e,
        )),
    };
    let telemetry = match ctx.telemetry.is_registered() {
        Ok(false) => Idle::Yes,
        Ok(true) => Idle::No,
        Err(e) => Idle::Unknown(CollaboratorError::new(
            StepKind::Telemetry,
            "cannot detect Red Hat Lightspeed (formerly Insights) status",
            e,
        )),
    };
    let subscription = match ctx.subscription.consumer_uuid() {
        Ok(uuid) if uuid.is_empty() => Idle::Yes,
        Ok(_) => Idle::No,
        Err(e) => Idle::Unknown(CollaboratorError::new(
            StepKind::Subscription,
            "unable to get consumer UUID",
            e,
        )),
    };
    DisconnectProbes {
        services,
        telemetry,
        subscription,
    }
}

/// Run the disconnect sequence over previously taken `probes`.
pub fn run(
    ctx: &Context,
    probes: DisconnectProbes,
    hostname: &str,
    reporter: &mut dyn Reporter,
) -> ConnectionOutcome {
    tracing::info!("disconnecting {hostname} from Red Hat");
    reporter.text(&format!(
        "Disconnecting {hostname} from Red Hat.\nThis might take a few seconds.\n\n"
    ));
    let mut outcome = ConnectionOutcome::new(Direction::Disconnect);
    let label = ctx.config.units.management_label().to_string();

    let (status, elapsed) = step(
        probes.services,
        reporter,
        &Messages {
            already: format!("The {label} service is already inactive"),
            spinner: format!("Deactivating the {label} service"),
            failed: format!("Cannot deactivate {label} service"),
            done: format!("Deactivated the {label} service"),
        },
        StepKind::Services,
        || systemd::deactivate_services(ctx.services.as_ref(), &ctx.config.units).map_err(|e| e.to_string()),
    );
    outcome.record(StepKind::Services, status, elapsed);

    let (status, elapsed) = step(
        probes.telemetry,
        reporter,
        &Messages {
            already: "Already disconnected from Red Hat Lightspeed (formerly Insights)".to_string(),
            spinner: "Disconnecting from Red Hat Lightspeed (formerly Insights)...".to_string(),
            failed: "Cannot disconnect from Red Hat Lightspeed (formerly Insights)".to_string(),
            done: "Disconnected from Red Hat Lightspeed (formerly Insights)".to_string(),
        },
        StepKind::Telemetry,
        || ctx.telemetry.unregister().map_err(|e| e.to_string()),
    );
    outcome.record(StepKind::Telemetry, status, elapsed);

    let (status, elapsed) = step(
        probes.subscription,
        reporter,
        &Messages {
            already: "Already disconnected from Red Hat Subscription Management".to_string(),
            spinner: "Disconnecting from Red Hat Subscription Management...".to_string(),
            failed: "Cannot disconnect from Red Hat Subscription Management".to_string(),
            done: "Disconnected from Red Hat Subscription Management".to_string(),
        },
        StepKind::Subscription,
        || ctx.subscription.unregister().map_err(|e| e.to_string()),
    );
    let unregistered = status.is_satisfied();
    outcome.record(StepKind::Subscription, status, elapsed);

    if unregistered && let Err(e) = ctx.marker.remove() {
        tracing::warn!("{e}");
    }
    outcome
}

struct Messages {
    already: String,
    spinner: String,
    failed: String,
    done: String,
}

fn step(
    probe: Idle,
    reporter: &mut dyn Reporter,
    messages: &Messages,
    kind: StepKind,
    action: impl FnOnce() -> Result<(), String>,
) -> (StepStatus, Duration) {
    let start = Instant::now();
    let status = match probe {
        Idle::Yes => {
            tracing::info!("{}", messages.already);
            reporter.line(Indent::Small, Icon::Info, &messages.already);
            StepStatus::AlreadySatisfied
        }
        Idle::Unknown(error) => {
            tracing::error!("{error}");
            reporter.line(Indent::Small, Icon::Error, &error.to_string());
            StepStatus::Failed(error)
        }
        Idle::No => {
            tracing::info!("{}", messages.spinner);
            let spinner = reporter.spinner(Indent::Small, &messages.spinner);
            let result = action();
            drop(spinner);
            match result {
                Ok(()) => {
                    reporter.line(Indent::Small, Icon::Ok, &messages.done);
                    StepStatus::Succeeded
                }
                Err(cause) => {
                    let error = CollaboratorError::new(kind, messages.failed.as_str(), cause);
                    tracing::error!("{error}");
                    reporter.line(Indent::Small, Icon::Error, &error.to_string());
                    StepStatus::Failed(error)
                }
            }
        }
    };
    (status, start.elapsed())
}
