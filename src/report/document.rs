//! Machine-readable documents emitted with `--format json`.
//!
//! Field names are part of the public contract; optional error fields are
//! omitted when empty.
use std::collections::BTreeMap;

use serde::Serialize;
use serde::ser::Serializer;

use crate::orchestrator::{ConnectionOutcome, StepKind, StepStatus, SystemStatus};

use super::HostInfo;

/// Serialize `value` as JSON indented by four spaces.
///
/// # Errors
///
/// Returns an error if `value` cannot be represented as JSON.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Per-feature entry of the connect document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureResult {
    /// Wanted for this run.
    pub enabled: bool,
    /// Ended up active.
    pub successful: bool,
    /// Not attempted because an earlier step failed.
    pub skipped: bool,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Feature block of the connect document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectFeatures {
    /// `content`
    pub content: FeatureResult,
    /// `analytics`
    pub analytics: FeatureResult,
    /// `remote-management`
    pub remote_management: FeatureResult,
}

/// Step durations in milliseconds, keyed by step label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Durations(BTreeMap<&'static str, u128>);

impl Durations {
    fn from_outcome(outcome: &ConnectionOutcome) -> Self {
        Self(
            outcome
                .steps()
                .iter()
                .map(|s| (s.kind.label(), s.duration.as_millis()))
                .collect(),
        )
    }
}

impl Serialize for Durations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // u128 is not supported by every serializer; clamp to u64.
        serializer.collect_map(
            self.0
                .iter()
                .map(|(k, v)| (*k, u64::try_from(*v).unwrap_or(u64::MAX))),
        )
    }
}

/// Result of `rhc connect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectDocument {
    /// Host name.
    pub hostname: String,
    /// Why the host name is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname_error: Option<String>,
    /// Effective uid of the caller.
    pub uid: u32,
    /// Set when the caller was rejected for not being root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid_error: Option<String>,
    /// Registration with subscription management succeeded.
    pub rhsm_connected: bool,
    /// Registration failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rhsm_connect_error: Option<String>,
    /// Per-feature results.
    pub features: ConnectFeatures,
    /// Step durations.
    pub durations_ms: Durations,
}

impl ConnectDocument {
    /// Build the document for a completed run.
    #[must_use]
    pub fn new(host: &HostInfo, outcome: &ConnectionOutcome) -> Self {
        let feature = |id: &str| {
            outcome
                .feature(id)
                .map(|f| FeatureResult {
                    enabled: f.enabled,
                    successful: f.successful,
                    skipped: f.skipped,
                    error: f.error.clone(),
                })
                .unwrap_or_default()
        };
        let rhsm = outcome.status(StepKind::Subscription);
        Self {
            hostname: host.hostname.clone(),
            hostname_error: host.hostname_error.clone(),
            uid: host.uid,
            uid_error: None,
            rhsm_connected: rhsm.is_satisfied(),
            rhsm_connect_error: rhsm.error().map(ToString::to_string),
            features: ConnectFeatures {
                content: feature("content"),
                analytics: feature("analytics"),
                remote_management: feature("remote-management"),
            },
            durations_ms: Durations::from_outcome(outcome),
        }
    }
}

/// Result of `rhc disconnect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisconnectDocument {
    /// Host name.
    pub hostname: String,
    /// Why the host name is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname_error: Option<String>,
    /// Effective uid of the caller.
    pub uid: u32,
    /// Set when the caller was rejected for not being root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid_error: Option<String>,
    /// The host is no longer registered.
    pub rhsm_disconnected: bool,
    /// Unregistration failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rhsm_disconnect_error: Option<String>,
    /// The telemetry client is no longer registered.
    pub insights_disconnected: bool,
    /// Telemetry unregistration failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights_disconnected_error: Option<String>,
    /// The management service is stopped.
    pub yggdrasil_stopped: bool,
    /// Service deactivation failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yggdrasil_stopped_error: Option<String>,
    /// Step durations.
    pub durations_ms: Durations,
}

fn split(status: &StepStatus) -> (bool, Option<String>) {
    (status.is_satisfied(), status.error().map(ToString::to_string))
}

impl DisconnectDocument {
    /// Build the document for a completed run.
    #[must_use]
    pub fn new(host: &HostInfo, outcome: &ConnectionOutcome) -> Self {
        let (rhsm_disconnected, rhsm_disconnect_error) =
            split(outcome.status(StepKind::Subscription));
        let (insights_disconnected, insights_disconnected_error) =
            split(outcome.status(StepKind::Telemetry));
        let (yggdrasil_stopped, yggdrasil_stopped_error) =
            split(outcome.status(StepKind::Services));
        Self {
            hostname: host.hostname.clone(),
            hostname_error: host.hostname_error.clone(),
            uid: host.uid,
            uid_error: None,
            rhsm_disconnected,
            rhsm_disconnect_error,
            insights_disconnected,
            insights_disconnected_error,
            yggdrasil_stopped,
            yggdrasil_stopped_error,
            durations_ms: Durations::from_outcome(outcome),
        }
    }
}

/// Result of `rhc status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusDocument {
    /// Host name.
    pub hostname: String,
    /// Why the host name is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname_error: Option<String>,
    /// Registered with subscription management.
    pub rhsm_connected: bool,
    /// Subscription probe failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rhsm_error: Option<String>,
    /// Repository management is on.
    pub content_enabled: bool,
    /// Content probe failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_error: Option<String>,
    /// Telemetry client registered.
    pub insights_connected: bool,
    /// Telemetry probe failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights_error: Option<String>,
    /// Management service active.
    pub yggdrasil_running: bool,
    /// Service probe failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yggdrasil_error: Option<String>,
}

impl StatusDocument {
    /// Build the document from probe results.
    #[must_use]
    pub fn new(host: &HostInfo, status: &SystemStatus) -> Self {
        let (rhsm_connected, rhsm_error) = status.subscription.split();
        let (content_enabled, content_error) = status.content.split();
        let (insights_connected, insights_error) = status.telemetry.split();
        let (yggdrasil_running, yggdrasil_error) = status.services.split();
        Self {
            hostname: host.hostname.clone(),
            hostname_error: host.hostname_error.clone(),
            rhsm_connected,
            rhsm_error,
            content_enabled,
            content_error,
            insights_connected,
            insights_error,
            yggdrasil_running,
            yggdrasil_error,
        }
    }
}

/// One row of `rhc configure features show --format json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureEntry {
    /// Feature id.
    pub id: &'static str,
    /// Human description.
    pub description: &'static str,
    /// Cannot be disabled.
    pub mandatory: bool,
    /// Live state when connected, preference otherwise.
    pub enabled: bool,
}
