//! `rhc status`: probe every collaborator once and report what is connected.
use crate::context::Context;
use crate::report::{Icon, Indent, Reporter};
use crate::rhsm;
use crate::systemd::ACTIVE;

/// Result of one status probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The collaborator answered.
    Ok(bool),
    /// The collaborator could not be asked.
    Error(String),
}

impl Probe {
    /// `true` only for `Ok(true)`.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::Ok(true))
    }

    /// `(state, error)` pair as used by the JSON document.
    #[must_use]
    pub fn split(&self) -> (bool, Option<String>) {
        match self {
            Self::Ok(state) => (*state, None),
            Self::Error(e) => (false, Some(e.clone())),
        }
    }
}

/// Connection state of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    /// Registered with subscription management.
    pub subscription: Probe,
    /// Repository file generation enabled on a registered host.
    pub content: Probe,
    /// Telemetry client registered.
    pub telemetry: Probe,
    /// Management service active.
    pub services: Probe,
}

impl SystemStatus {
    /// `true` when every probe reports the connected state.
    #[must_use]
    pub const fn all_connected(&self) -> bool {
        self.subscription.is_on()
            && self.content.is_on()
            && self.telemetry.is_on()
            && self.services.is_on()
    }
}

/// Probe subscription, content, telemetry and the management service, in
/// that order, streaming one line per probe.
pub fn probe_status(ctx: &Context, reporter: &mut dyn Reporter) -> SystemStatus {
    tracing::info!("checking status of Red Hat Subscription Management");
    let uuid = ctx.subscription.consumer_uuid();
    let subscription = match &uuid {
        Ok(uuid) if uuid.is_empty() => {
            reporter.line(
                Indent::Small,
                Icon::Off,
                "Not connected to Red Hat Subscription Management",
            );
            Probe::Ok(false)
        }
        Ok(_) => {
            reporter.line(
                Indent::Small,
                Icon::Ok,
                "Connected to Red Hat Subscription Management",
            );
            Probe::Ok(true)
        }
        Err(e) => {
            tracing::error!("cannot detect Red Hat Subscription Management status: {e}");
            reporter.line(
                Indent::Small,
                Icon::Error,
                &format!("Red Hat Subscription Management ... unable to get consumer UUID: {e}"),
            );
            Probe::Error(e.to_string())
        }
    };

    tracing::info!("checking content status");
    let manage_repos = rhsm::manage_repos(ctx.subscription.as_ref());
    let content = match (&manage_repos, &uuid) {
        (Err(e), _) | (Ok(_), Err(e)) => {
            tracing::error!("cannot detect content management status: {e}");
            reporter.line(Indent::Medium, Icon::Error, &format!("Content ... {e}"));
            Probe::Error(e.to_string())
        }
        (Ok(true), Ok(uuid)) if !uuid.is_empty() => {
            reporter.line(
                Indent::Medium,
                Icon::Ok,
                "Content ... Red Hat repository file generated",
            );
            Probe::Ok(true)
        }
        (Ok(false), Ok(uuid)) if !uuid.is_empty() => {
            reporter.line(
                Indent::Medium,
                Icon::Off,
                "Content ... Generating of Red Hat repository file disabled in rhsm.conf",
            );
            Probe::Ok(false)
        }
        (Ok(_), Ok(_)) => {
            reporter.line(
                Indent::Medium,
                Icon::Off,
                "Content ... Red Hat repository file not generated",
            );
            Probe::Ok(false)
        }
    };

    tracing::info!("checking status of Red Hat Lightspeed");
    let spinner = reporter.spinner(
        Indent::Medium,
        "Checking Red Hat Lightspeed (formerly Insights)...",
    );
    let registered = ctx.telemetry.is_registered();
    drop(spinner);
    let telemetry = match registered {
        Ok(true) => {
            reporter.line(
                Indent::Medium,
                Icon::Ok,
                "Analytics ... Connected to Red Hat Lightspeed (formerly Insights)",
            );
            Probe::Ok(true)
        }
        Ok(false) => {
            reporter.line(
                Indent::Medium,
                Icon::Off,
                "Analytics ... Not connected to Red Hat Lightspeed (formerly Insights)",
            );
            Probe::Ok(false)
        }
        Err(e) => {
            tracing::error!("cannot detect Red Hat Lightspeed status: {e}");
            reporter.line(
                Indent::Medium,
                Icon::Error,
                &format!(
                    "Analytics ... Cannot detect Red Hat Lightspeed (formerly Insights) status: {e}"
                ),
            );
            Probe::Error(e.to_string())
        }
    };

    let units = &ctx.config.units;
    let label = units.management_label();
    tracing::info!("checking status of {label} service");
    let services = match ctx.services.unit_state(&units.management_service) {
        Ok(state) if state == ACTIVE => {
            reporter.line(
                Indent::Medium,
                Icon::Ok,
                &format!("Remote Management ... The {label} service is active"),
            );
            Probe::Ok(true)
        }
        Ok(state) => {
            tracing::warn!("{} is {state}", units.management_service);
            reporter.line(
                Indent::Medium,
                Icon::Off,
                &format!("Remote Management ... The {label} service is {state}"),
            );
            Probe::Ok(false)
        }
        Err(e) => {
            let message = format!("unable to get state of {}: {e}", units.management_service);
            tracing::error!("{message}");
            reporter.line(
                Indent::Medium,
                Icon::Error,
                &format!("Remote Management ... {message}"),
            );
            Probe::Error(message)
        }
    };

    SystemStatus {
        subscription,
        content,
        telemetry,
        services,
    }
}
