//! Service manager collaborator and the remote-management unit sequences.
pub mod dbus;

use serde::Deserialize;
use thiserror::Error;

pub use dbus::DbusServiceManager;

/// `ActiveState` of a running unit.
pub const ACTIVE: &str = "active";

/// `ActiveState` of a stopped unit.
pub const INACTIVE: &str = "inactive";

/// Errors returned by the service manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The bus call failed.
    #[error("{0}")]
    Bus(String),

    /// A start or stop job did not complete in time.
    #[error("timed out waiting {timeout_secs}s for the {unit} job")]
    Timeout {
        /// Unit the job acts on.
        unit: String,
        /// How long we waited.
        timeout_secs: u64,
    },

    /// A start or stop job completed with a result other than `done`.
    #[error("job for {unit} finished with result '{result}'")]
    JobFailed {
        /// Unit the job acted on.
        unit: String,
        /// Job result reported by systemd, e.g. `failed` or `dependency`.
        result: String,
    },

    /// One step of an activation sequence failed.
    #[error("cannot {action} {unit}: {source}")]
    Step {
        /// Verb of the failed step, e.g. `enable`.
        action: &'static str,
        /// Unit the step acted on.
        unit: String,
        /// Underlying failure.
        source: Box<ServiceError>,
    },

    /// The final daemon reload failed.
    #[error("cannot reload systemd: {0}")]
    Reload(Box<ServiceError>),
}

/// Unit lifecycle operations. Enabling an enabled unit or stopping a
/// stopped one is not an error.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceManager: Send + Sync {
    /// Enable `name`, starting it and waiting for it when `activate` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot be enabled or started.
    fn enable_unit(&self, name: &str, activate: bool, runtime: bool) -> Result<(), ServiceError>;

    /// Disable `name`, stopping it and waiting for it when `deactivate` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot be disabled or stopped.
    fn disable_unit(&self, name: &str, deactivate: bool, runtime: bool)
    -> Result<(), ServiceError>;

    /// Start `name`. With `wait`, block until the start job completes; a
    /// oneshot service has finished running by then.
    ///
    /// # Errors
    ///
    /// Returns an error if the job cannot be queued, completes with a result
    /// other than `done`, or the wait times out.
    fn start_unit(&self, name: &str, wait: bool) -> Result<(), ServiceError>;

    /// Stop `name`. With `wait`, block until the stop job completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the job cannot be queued, completes with a result
    /// other than `done`, or the wait times out.
    fn stop_unit(&self, name: &str, wait: bool) -> Result<(), ServiceError>;

    /// Current `ActiveState` of `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot be loaded or queried.
    fn unit_state(&self, name: &str) -> Result<String, ServiceError>;

    /// Reload unit files.
    ///
    /// # Errors
    ///
    /// Returns an error if the reload fails.
    fn reload(&self) -> Result<(), ServiceError>;
}

/// Units making up remote management.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct UnitNames {
    /// Timer refreshing host facts.
    pub facts_timer: String,
    /// One-shot service writing host facts.
    pub facts_service: String,
    /// Remote management daemon.
    pub management_service: String,
}

impl Default for UnitNames {
    fn default() -> Self {
        Self {
            facts_timer: "rhc-canonical-facts.timer".to_string(),
            facts_service: "rhc-canonical-facts.service".to_string(),
            management_service: "yggdrasil.service".to_string(),
        }
    }
}

impl UnitNames {
    /// Management service name without the `.service` suffix, as shown to users.
    #[must_use]
    pub fn management_label(&self) -> &str {
        self.management_service
            .strip_suffix(".service")
            .unwrap_or(&self.management_service)
    }
}

/// Map the result of a finished job to an error unless it is `done`.
///
/// # Errors
///
/// Returns [`ServiceError::JobFailed`] for any other result.
pub fn job_result(unit: &str, result: &str) -> Result<(), ServiceError> {
    if result == "done" {
        Ok(())
    } else {
        Err(ServiceError::JobFailed {
            unit: unit.to_string(),
            result: result.to_string(),
        })
    }
}

fn step<'a>(action: &'static str, unit: &'a str) -> impl FnOnce(ServiceError) -> ServiceError + 'a {
    move |e| ServiceError::Step {
        action,
        unit: unit.to_string(),
        source: Box::new(e),
    }
}

/// Bring remote management up.
///
/// Enables and starts the facts timer, runs the facts service once so
/// facts exist before the daemon starts, enables and starts the daemon and
/// reloads unit files. Stops at the first failure.
///
/// # Errors
///
/// Returns the first failing step.
pub fn activate_services(manager: &dyn ServiceManager, units: &UnitNames) -> Result<(), ServiceError> {
    tracing::debug!("enabling {}", units.facts_timer);
    manager
        .enable_unit(&units.facts_timer, true, false)
        .map_err(step("enable", &units.facts_timer))?;

    tracing::debug!("starting {}", units.facts_service);
    manager
        .start_unit(&units.facts_service, true)
        .map_err(step("start", &units.facts_service))?;

    tracing::debug!("enabling {}", units.management_service);
    manager
        .enable_unit(&units.management_service, true, false)
        .map_err(step("enable", &units.management_service))?;

    tracing::debug!("reloading systemd");
    manager
        .reload()
        .map_err(|e| ServiceError::Reload(Box::new(e)))
}

/// Tear remote management down: disable and stop the facts timer and the
/// daemon, then reload unit files. Stops at the first failure.
///
/// # Errors
///
/// Returns the first failing step.
pub fn deactivate_services(
    manager: &dyn ServiceManager,
    units: &UnitNames,
) -> Result<(), ServiceError> {
    tracing::debug!("disabling {}", units.facts_timer);
    manager
        .disable_unit(&units.facts_timer, true, false)
        .map_err(step("disable", &units.facts_timer))?;

    tracing::debug!("disabling {}", units.management_service);
    manager
        .disable_unit(&units.management_service, true, false)
        .map_err(step("disable", &units.management_service))?;

    tracing::debug!("reloading systemd");
    manager
        .reload()
        .map_err(|e| ServiceError::Reload(Box::new(e)))
}

/// Whether the management daemon is running.
///
/// # Errors
///
/// Returns an error if the unit state cannot be read.
pub fn management_active(manager: &dyn ServiceManager, units: &UnitNames) -> Result<bool, ServiceError> {
    Ok(manager.unit_state(&units.management_service)? == ACTIVE)
}
