//! `org.freedesktop.systemd1` over the system bus.
//!
//! Start and stop jobs are waited for through the manager's `JobRemoved`
//! signal, so a oneshot unit has finished running when a waited start
//! returns.
use std::sync::OnceLock;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use zbus::blocking::{Connection, MessageIterator};
use zbus::zvariant::{DynamicType, OwnedObjectPath, OwnedValue};
use zbus::{MatchRule, message};

use super::{ServiceError, ServiceManager, job_result};

const SERVICE: &str = "org.freedesktop.systemd1";
const MANAGER_PATH: &str = "/org/freedesktop/systemd1";
const MANAGER_IFACE: &str = "org.freedesktop.systemd1.Manager";
const UNIT_IFACE: &str = "org.freedesktop.systemd1.Unit";
const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";

const JOB_TIMEOUT: Duration = Duration::from_secs(90);

impl From<zbus::Error> for ServiceError {
    fn from(e: zbus::Error) -> Self {
        match e {
            zbus::Error::MethodError(name, Some(description), _) => {
                Self::Bus(format!("{}: {description}", name.as_str()))
            }
            zbus::Error::MethodError(name, None, _) => Self::Bus(name.as_str().to_string()),
            other => Self::Bus(other.to_string()),
        }
    }
}

fn call<B>(
    conn: &Connection,
    path: &str,
    iface: &str,
    method: &str,
    body: &B,
) -> Result<zbus::Message, ServiceError>
where
    B: Serialize + DynamicType,
{
    tracing::trace!("calling {iface}.{method} on {path}");
    Ok(conn.call_method(Some(SERVICE), path, Some(iface), method, body)?)
}

/// Service manager reached over D-Bus.
#[derive(Debug, Default)]
pub struct DbusServiceManager {
    bus: OnceLock<Connection>,
}

impl DbusServiceManager {
    /// Adapter that connects to the system bus on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bus(&self) -> Result<&Connection, ServiceError> {
        if let Some(conn) = self.bus.get() {
            return Ok(conn);
        }
        let conn = Connection::system()
            .map_err(|e| ServiceError::Bus(format!("cannot connect to system D-Bus: {e}")))?;
        Ok(self.bus.get_or_init(|| conn))
    }

    fn unit_path(&self, name: &str) -> Result<OwnedObjectPath, ServiceError> {
        let msg = call(self.bus()?, MANAGER_PATH, MANAGER_IFACE, "LoadUnit", &(name,))?;
        msg.body()
            .deserialize::<OwnedObjectPath>()
            .map_err(|e| ServiceError::Bus(e.to_string()))
    }

    /// Subscribe to `JobRemoved` before a job is queued so its completion
    /// cannot be missed.
    fn job_signals(&self) -> Result<MessageIterator, ServiceError> {
        let conn = self.bus()?;
        if let Err(e) = call(conn, MANAGER_PATH, MANAGER_IFACE, "Subscribe", &()) {
            tracing::debug!("systemd Subscribe failed: {e}");
        }
        let rule = MatchRule::builder()
            .msg_type(message::Type::Signal)
            .sender(SERVICE)?
            .path(MANAGER_PATH)?
            .interface(MANAGER_IFACE)?
            .member("JobRemoved")?
            .build();
        Ok(MessageIterator::for_match_rule(rule, conn, None)?)
    }

    /// Queue `method` for `name` and, with `wait`, block until the job is
    /// removed and check its result.
    fn run_job(&self, method: &str, name: &str, wait: bool) -> Result<(), ServiceError> {
        let signals = wait.then(|| self.job_signals()).transpose()?;
        let msg = call(self.bus()?, MANAGER_PATH, MANAGER_IFACE, method, &(name, "replace"))?;
        let job: OwnedObjectPath = msg
            .body()
            .deserialize()
            .map_err(|e| ServiceError::Bus(e.to_string()))?;
        tracing::debug!("queued {method} job {} for {name}", job.as_str());
        let Some(signals) = signals else {
            return Ok(());
        };
        let result = wait_for_job(signals, job, name)?;
        tracing::debug!("{method} job for {name} finished: {result}");
        job_result(name, &result)
    }
}

/// Result string of the `JobRemoved` signal for `job`.
fn wait_for_job(
    signals: MessageIterator,
    job: OwnedObjectPath,
    unit: &str,
) -> Result<String, ServiceError> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for msg in signals.flatten() {
            let Ok((_id, path, _unit, result)) = msg
                .body()
                .deserialize::<(u32, OwnedObjectPath, String, String)>()
            else {
                continue;
            };
            if path == job {
                tx.send(result).ok();
                return;
            }
        }
    });
    rx.recv_timeout(JOB_TIMEOUT).map_err(|_| ServiceError::Timeout {
        unit: unit.to_string(),
        timeout_secs: JOB_TIMEOUT.as_secs(),
    })
}

impl ServiceManager for DbusServiceManager {
    fn enable_unit(&self, name: &str, activate: bool, runtime: bool) -> Result<(), ServiceError> {
        call(
            self.bus()?,
            MANAGER_PATH,
            MANAGER_IFACE,
            "EnableUnitFiles",
            &(&[name][..], runtime, true),
        )?;
        if activate {
            self.start_unit(name, true)?;
        }
        Ok(())
    }

    fn disable_unit(
        &self,
        name: &str,
        deactivate: bool,
        runtime: bool,
    ) -> Result<(), ServiceError> {
        call(
            self.bus()?,
            MANAGER_PATH,
            MANAGER_IFACE,
            "DisableUnitFiles",
            &(&[name][..], runtime),
        )?;
        if deactivate {
            self.stop_unit(name, true)?;
        }
        Ok(())
    }

    fn start_unit(&self, name: &str, wait: bool) -> Result<(), ServiceError> {
        self.run_job("StartUnit", name, wait)
    }

    fn stop_unit(&self, name: &str, wait: bool) -> Result<(), ServiceError> {
        self.run_job("StopUnit", name, wait)
    }

    fn unit_state(&self, name: &str) -> Result<String, ServiceError> {
        let path = self.unit_path(name)?;
        let msg = call(
            self.bus()?,
            path.as_str(),
            PROPERTIES_IFACE,
            "Get",
            &(UNIT_IFACE, "ActiveState"),
        )?;
        let value: OwnedValue = msg
            .body()
            .deserialize()
            .map_err(|e| ServiceError::Bus(e.to_string()))?;
        String::try_from(value).map_err(|e| ServiceError::Bus(format!("ActiveState of {name}: {e}")))
    }

    fn reload(&self) -> Result<(), ServiceError> {
        call(self.bus()?, MANAGER_PATH, MANAGER_IFACE, "Reload", &())?;
        Ok(())
    }
}
