//! The features shipped with `rhc`.
//!
//! ```text
//! identity <- content <- analytics <- remote-management
//! ```
use super::Feature;
use crate::context::Context;
use crate::error::CollaboratorError;
use crate::orchestrator::StepKind;
use crate::rhsm::{self, MANAGE_REPOS};
use crate::systemd;

/// Id of the mandatory root feature.
pub const IDENTITY: &str = "identity";
/// Id of the repository feature.
pub const CONTENT: &str = "content";
/// Id of the telemetry feature.
pub const ANALYTICS: &str = "analytics";
/// Id of the remote management feature.
pub const REMOTE_MANAGEMENT: &str = "remote-management";

/// Every built-in feature, least dependent first.
#[must_use]
pub fn all_features() -> Vec<Box<dyn Feature>> {
    vec![
        Box::new(Identity),
        Box::new(Content),
        Box::new(Analytics),
        Box::new(RemoteManagement),
    ]
}

/// Registration with subscription management. Always on.
#[derive(Debug, Clone, Copy)]
pub struct Identity;

impl Feature for Identity {
    fn id(&self) -> &'static str {
        IDENTITY
    }

    fn description(&self) -> &'static str {
        "Registration with subscription management"
    }

    fn mandatory(&self) -> bool {
        true
    }

    fn live_state(&self, ctx: &Context) -> Result<bool, CollaboratorError> {
        ctx.subscription
            .consumer_uuid()
            .map(|uuid| !uuid.is_empty())
            .map_err(|e| CollaboratorError::new(StepKind::Subscription, "unable to get consumer UUID", e))
    }

    // Registration itself is driven by the connect and disconnect steps.
    fn activate(&self, _: &Context) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn deactivate(&self, _: &Context) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Generation of the Red Hat repository file.
#[derive(Debug, Clone, Copy)]
pub struct Content;

impl Content {
    fn set(ctx: &Context, value: &str, verb: &str) -> Result<(), CollaboratorError> {
        tracing::info!("setting {MANAGE_REPOS} to {value}");
        ctx.subscription
            .set_config_value(MANAGE_REPOS, value)
            .map_err(|e| {
                CollaboratorError::new(
                    StepKind::Subscription,
                    format!("cannot {verb} generation of Red Hat repository file"),
                    e,
                )
            })
    }
}

impl Feature for Content {
    fn id(&self) -> &'static str {
        CONTENT
    }

    fn description(&self) -> &'static str {
        "Access to package repositories"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[IDENTITY]
    }

    fn live_state(&self, ctx: &Context) -> Result<bool, CollaboratorError> {
        rhsm::manage_repos(ctx.subscription.as_ref()).map_err(|e| {
            CollaboratorError::new(StepKind::Subscription, format!("cannot read {MANAGE_REPOS}"), e)
        })
    }

    fn activate(&self, ctx: &Context) -> Result<(), CollaboratorError> {
        Self::set(ctx, "1", "enable")
    }

    fn deactivate(&self, ctx: &Context) -> Result<(), CollaboratorError> {
        Self::set(ctx, "0", "disable")
    }
}

/// Data collection by the telemetry client.
#[derive(Debug, Clone, Copy)]
pub struct Analytics;

impl Feature for Analytics {
    fn id(&self) -> &'static str {
        ANALYTICS
    }

    fn description(&self) -> &'static str {
        "Red Hat Lightspeed data collection"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[IDENTITY, CONTENT]
    }

    fn live_state(&self, ctx: &Context) -> Result<bool, CollaboratorError> {
        ctx.telemetry.is_registered().map_err(|e| {
            CollaboratorError::new(
                StepKind::Telemetry,
                "cannot detect Red Hat Lightspeed (formerly Insights) status",
                e,
            )
        })
    }

    fn activate(&self, ctx: &Context) -> Result<(), CollaboratorError> {
        ctx.telemetry.register().map_err(|e| {
            CollaboratorError::new(
                StepKind::Telemetry,
                "cannot connect to Red Hat Lightspeed (formerly Insights)",
                e,
            )
        })
    }

    fn deactivate(&self, ctx: &Context) -> Result<(), CollaboratorError> {
        ctx.telemetry.unregister().map_err(|e| {
            CollaboratorError::new(
                StepKind::Telemetry,
                "cannot disconnect from Red Hat Lightspeed (formerly Insights)",
                e,
            )
        })
    }
}

/// The remote management daemon and its facts timer.
#[derive(Debug, Clone, Copy)]
pub struct RemoteManagement;

impl Feature for RemoteManagement {
    fn id(&self) -> &'static str {
        REMOTE_MANAGEMENT
    }

    fn description(&self) -> &'static str {
        "Red Hat Lightspeed remote management"
    }

    fn requires(&self) -> &'static [&'static str] {
        &[IDENTITY, CONTENT, ANALYTICS]
    }

    fn live_state(&self, ctx: &Context) -> Result<bool, CollaboratorError> {
        let units = &ctx.config.units;
        systemd::management_active(ctx.services.as_ref(), units).map_err(|e| {
            CollaboratorError::new(
                StepKind::Services,
                format!("unable to get state of {}", units.management_service),
                e,
            )
        })
    }

    fn activate(&self, ctx: &Context) -> Result<(), CollaboratorError> {
        systemd::activate_services(ctx.services.as_ref(), &ctx.config.units).map_err(|e| {
            CollaboratorError::new(StepKind::Services, "cannot activate the yggdrasil service", e)
        })
    }

    fn deactivate(&self, ctx: &Context) -> Result<(), CollaboratorError> {
        systemd::deactivate_services(ctx.services.as_ref(), &ctx.config.units).map_err(|e| {
            CollaboratorError::new(StepKind::Services, "cannot deactivate the yggdrasil service", e)
        })
    }
}
