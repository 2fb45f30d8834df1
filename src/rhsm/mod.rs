//! Subscription management (RHSM) collaborator.
//!
//! [`SubscriptionService`] is the boundary the rest of the crate talks to;
//! [`dbus::DbusSubscription`] implements it against `com.redhat.RHSM1` on
//! the system bus. Raw D-Bus errors are decoded once, here, into
//! [`RhsmError`].
pub mod dbus;

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

pub use dbus::DbusSubscription;

/// D-Bus error name used by the subscription service for structured errors.
pub const SERVICE_ERROR_NAME: &str = "com.redhat.RHSM1.Error";

/// Exception tag raised when a multi-organization account registers without
/// choosing an organization.
pub const ORG_NOT_SPECIFIED: &str = "OrgNotSpecifiedException";

/// Errors returned by the subscription service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RhsmError {
    /// The account belongs to several organizations and none was given.
    #[error("{severity}: {message}")]
    OrgNotSpecified {
        /// Severity reported by the service.
        severity: String,
        /// Message reported by the service.
        message: String,
    },

    /// Structured error raised by the service.
    #[error("{severity}: {message}")]
    Service {
        /// Exception class name.
        exception: String,
        /// Severity reported by the service.
        severity: String,
        /// Message reported by the service.
        message: String,
    },

    /// The bus or the service could not be reached.
    #[error("{0}")]
    Bus(String),

    /// The service replied with something unexpected.
    #[error("malformed reply from subscription service: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    exception: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    message: String,
}

impl RhsmError {
    /// Classify a D-Bus method error.
    ///
    /// Errors named [`SERVICE_ERROR_NAME`] carry a JSON body
    /// `{"exception", "severity", "message"}`; anything else is reported
    /// as a bus error with its description.
    #[must_use]
    pub fn decode(name: &str, description: Option<&str>) -> Self {
        let description = description.unwrap_or_default();
        if name != SERVICE_ERROR_NAME {
            return if description.is_empty() {
                Self::Bus(name.to_string())
            } else {
                Self::Bus(format!("{name}: {description}"))
            };
        }
        match serde_json::from_str::<ErrorBody>(description) {
            Ok(body) if body.exception == ORG_NOT_SPECIFIED => Self::OrgNotSpecified {
                severity: body.severity,
                message: body.message,
            },
            Ok(body) => Self::Service {
                exception: body.exception,
                severity: body.severity,
                message: body.message,
            },
            Err(e) => Self::Malformed(format!("{e}: {description}")),
        }
    }

    /// `true` for the organization-not-specified exception.
    #[must_use]
    pub const fn is_org_not_specified(&self) -> bool {
        matches!(self, Self::OrgNotSpecified { .. })
    }
}

/// Options passed with a registration request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Let the service generate the repository file.
    pub enable_content: bool,
    /// Content template names to register into.
    pub content_templates: Vec<String>,
}

impl RegisterOptions {
    /// The `a{ss}` options map sent over D-Bus.
    #[must_use]
    pub fn to_dbus_options(&self) -> HashMap<String, String> {
        let mut options = HashMap::new();
        options.insert(
            "enable_content".to_string(),
            self.enable_content.to_string(),
        );
        if !self.content_templates.is_empty() {
            options.insert(
                "environment_names".to_string(),
                self.content_templates.join(","),
            );
            options.insert(
                "environment_type".to_string(),
                "content-template".to_string(),
            );
        }
        options
    }
}

/// Parse the JSON array returned by `GetOrgs` into organization keys.
///
/// # Errors
///
/// Returns [`RhsmError::Malformed`] if `json` is not an array of objects.
pub fn parse_organizations(json: &str) -> Result<Vec<String>, RhsmError> {
    #[derive(Deserialize)]
    struct Organization {
        key: String,
    }
    let orgs: Vec<Organization> =
        serde_json::from_str(json).map_err(|e| RhsmError::Malformed(e.to_string()))?;
    Ok(orgs.into_iter().map(|o| o.key).collect())
}

/// Registration and configuration operations of the subscription service.
#[cfg_attr(test, mockall::automock)]
pub trait SubscriptionService: Send + Sync {
    /// Consumer UUID of this host, empty when not registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be queried.
    fn consumer_uuid(&self) -> Result<String, RhsmError>;

    /// Register with a user name and password.
    ///
    /// `org` may be empty, in which case the service picks the only
    /// organization of the account or fails with
    /// [`RhsmError::OrgNotSpecified`].
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails.
    fn register(
        &self,
        org: &str,
        username: &str,
        password: &str,
        options: &RegisterOptions,
    ) -> Result<(), RhsmError>;

    /// Register with activation keys.
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails.
    fn register_with_activation_keys(
        &self,
        org: &str,
        keys: &[String],
        options: &RegisterOptions,
    ) -> Result<(), RhsmError>;

    /// Organization keys the account may register into.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    fn organizations(&self, username: &str, password: &str) -> Result<Vec<String>, RhsmError>;

    /// Remove the host's registration.
    ///
    /// # Errors
    ///
    /// Returns an error if unregistration fails.
    fn unregister(&self) -> Result<(), RhsmError>;

    /// Read an `rhsm.conf` value, e.g. `rhsm.manage_repos`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be read.
    fn config_value(&self, key: &str) -> Result<String, RhsmError>;

    /// Write an `rhsm.conf` value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn set_config_value(&self, key: &str, value: &str) -> Result<(), RhsmError>;
}

/// `rhsm.conf` key controlling repository file generation.
pub const MANAGE_REPOS: &str = "rhsm.manage_repos";

/// Whether `rhsm.conf` lets the service generate the repository file.
///
/// # Errors
///
/// Returns an error if the value cannot be read.
pub fn manage_repos(service: &dyn SubscriptionService) -> Result<bool, RhsmError> {
    Ok(service.config_value(MANAGE_REPOS)?.trim() == "1")
}
