// Shared helpers for integration tests.
//
// Provides an in-memory host standing in for subscription management, the
// telemetry client and systemd, so each integration test can drive the real
// commands against an isolated state directory.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use rhc_cli::config::Config;
use rhc_cli::context::Context;
use rhc_cli::features::FeatureRegistry;
use rhc_cli::report::{HostInfo, OutputMode, ReportBuilder};
use rhc_cli::rhsm::{RegisterOptions, RhsmError, SubscriptionService};
use rhc_cli::systemd::{ACTIVE, INACTIVE, ServiceError, ServiceManager};
use rhc_cli::telemetry::{TelemetryClient, TelemetryError};
use tempfile::TempDir;

/// Mutable state of a [`FakeHost`].
#[derive(Debug, Default)]
pub struct HostState {
    /// Consumer UUID; empty when unregistered.
    pub uuid: String,
    /// Telemetry client registration.
    pub telemetry_registered: bool,
    /// `ActiveState` per unit; missing units are inactive.
    pub units: BTreeMap<String, &'static str>,
    /// `rhsm.conf` values.
    pub rhsm_config: BTreeMap<String, String>,
    /// Every collaborator call, in order.
    pub calls: Vec<String>,
    /// Operations that fail, by call name (e.g. `telemetry.register`).
    pub failing: BTreeSet<&'static str>,
}

/// In-memory host implementing every collaborator trait.
#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<HostState>>,
}

impl FakeHost {
    /// A host with nothing registered or running.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fully connected host.
    pub fn connected() -> Self {
        let host = Self::new();
        host.with(|s| {
            s.uuid = "8c3f0f4e-0000-4000-8000-000000000001".to_string();
            s.telemetry_registered = true;
            s.units.insert("yggdrasil.service".to_string(), ACTIVE);
            s.units
                .insert("rhc-canonical-facts.timer".to_string(), ACTIVE);
        });
        host
    }

    /// Make the named operation fail from now on.
    pub fn fail(&self, call: &'static str) {
        self.with(|s| {
            s.failing.insert(call);
        });
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    /// Run `f` on the locked state.
    pub fn with<T>(&self, f: impl FnOnce(&mut HostState) -> T) -> T {
        let mut state = self.state.lock().expect("host state lock");
        f(&mut state)
    }

    fn call(&self, name: &'static str, detail: &str) -> bool {
        self.with(|s| {
            if detail.is_empty() {
                s.calls.push(name.to_string());
            } else {
                s.calls.push(format!("{name} {detail}"));
            }
            s.failing.contains(name)
        })
    }

    /// Context over this host with the built-in registry and state in a
    /// fresh temp dir.
    pub fn context(&self) -> (TempDir, Context) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config {
            state_dir: dir.path().join("state"),
            ..Config::default()
        };
        let ctx = Context::new(
            Arc::new(config),
            Arc::new(FeatureRegistry::builtin().expect("builtin registry")),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        );
        (dir, ctx)
    }
}

impl SubscriptionService for FakeHost {
    fn consumer_uuid(&self) -> Result<String, RhsmError> {
        if self.call("rhsm.uuid", "") {
            return Err(RhsmError::Bus("connection refused".to_string()));
        }
        Ok(self.with(|s| s.uuid.clone()))
    }

    fn register(
        &self,
        org: &str,
        username: &str,
        _password: &str,
        options: &RegisterOptions,
    ) -> Result<(), RhsmError> {
        let detail = format!("{org}/{username} content={}", options.enable_content);
        if self.call("rhsm.register", &detail) {
            return Err(RhsmError::Bus("Invalid credentials".to_string()));
        }
        if org.is_empty() {
            return Err(RhsmError::OrgNotSpecified {
                severity: "error".to_string(),
                message: "You must specify an organization for new units.".to_string(),
            });
        }
        self.with(|s| s.uuid = "8c3f0f4e-0000-4000-8000-000000000002".to_string());
        Ok(())
    }

    fn register_with_activation_keys(
        &self,
        org: &str,
        keys: &[String],
        options: &RegisterOptions,
    ) -> Result<(), RhsmError> {
        let detail = format!("{org}/{} content={}", keys.join(","), options.enable_content);
        if self.call("rhsm.register_keys", &detail) {
            return Err(RhsmError::Bus("Invalid activation key".to_string()));
        }
        self.with(|s| s.uuid = "8c3f0f4e-0000-4000-8000-000000000003".to_string());
        Ok(())
    }

    fn organizations(&self, username: &str, _password: &str) -> Result<Vec<String>, RhsmError> {
        if self.call("rhsm.organizations", username) {
            return Err(RhsmError::Bus("cannot list organizations".to_string()));
        }
        Ok(vec!["acme".to_string(), "globex".to_string()])
    }

    fn unregister(&self) -> Result<(), RhsmError> {
        if self.call("rhsm.unregister", "") {
            return Err(RhsmError::Bus("unregister failed".to_string()));
        }
        self.with(|s| s.uuid.clear());
        Ok(())
    }

    fn config_value(&self, key: &str) -> Result<String, RhsmError> {
        if self.call("rhsm.config_value", key) {
            return Err(RhsmError::Bus("cannot read configuration".to_string()));
        }
        Ok(self.with(|s| s.rhsm_config.get(key).cloned().unwrap_or_else(|| "1".to_string())))
    }

    fn set_config_value(&self, key: &str, value: &str) -> Result<(), RhsmError> {
        if self.call("rhsm.set_config_value", &format!("{key}={value}")) {
            return Err(RhsmError::Bus("cannot write configuration".to_string()));
        }
        self.with(|s| s.rhsm_config.insert(key.to_string(), value.to_string()));
        Ok(())
    }
}

impl TelemetryClient for FakeHost {
    fn register(&self) -> Result<(), TelemetryError> {
        if self.call("telemetry.register", "") {
            return Err(TelemetryError::Failed {
                flag: "--register",
                code: Some(1),
                stderr: "Unable to register".to_string(),
            });
        }
        self.with(|s| s.telemetry_registered = true);
        Ok(())
    }

    fn unregister(&self) -> Result<(), TelemetryError> {
        if self.call("telemetry.unregister", "") {
            return Err(TelemetryError::Failed {
                flag: "--unregister",
                code: Some(1),
                stderr: "Unable to unregister".to_string(),
            });
        }
        self.with(|s| s.telemetry_registered = false);
        Ok(())
    }

    fn is_registered(&self) -> Result<bool, TelemetryError> {
        if self.call("telemetry.status", "") {
            return Err(TelemetryError::NotInstalled("insights-client".to_string()));
        }
        Ok(self.with(|s| s.telemetry_registered))
    }
}

impl FakeHost {
    fn set_unit(&self, name: &str, state: &'static str) {
        self.with(|s| s.units.insert(name.to_string(), state));
    }
}

impl ServiceManager for FakeHost {
    fn enable_unit(&self, name: &str, activate: bool, _runtime: bool) -> Result<(), ServiceError> {
        if self.call("systemd.enable", name) {
            return Err(ServiceError::Bus("Unit not found".to_string()));
        }
        if activate {
            self.set_unit(name, ACTIVE);
        }
        Ok(())
    }

    fn disable_unit(&self, name: &str, deactivate: bool, _runtime: bool) -> Result<(), ServiceError> {
        if self.call("systemd.disable", name) {
            return Err(ServiceError::Bus("Unit not found".to_string()));
        }
        if deactivate {
            self.set_unit(name, INACTIVE);
        }
        Ok(())
    }

    fn start_unit(&self, name: &str, _wait: bool) -> Result<(), ServiceError> {
        if self.call("systemd.start", name) {
            return Err(ServiceError::Bus("start job failed".to_string()));
        }
        self.set_unit(name, ACTIVE);
        Ok(())
    }

    fn stop_unit(&self, name: &str, _wait: bool) -> Result<(), ServiceError> {
        if self.call("systemd.stop", name) {
            return Err(ServiceError::Bus("stop job failed".to_string()));
        }
        self.set_unit(name, INACTIVE);
        Ok(())
    }

    fn unit_state(&self, name: &str) -> Result<String, ServiceError> {
        if self.call("systemd.state", name) {
            return Err(ServiceError::Bus("no such unit".to_string()));
        }
        Ok(self.with(|s| s.units.get(name).copied().unwrap_or(INACTIVE).to_string()))
    }

    fn reload(&self) -> Result<(), ServiceError> {
        if self.call("systemd.reload", "") {
            return Err(ServiceError::Bus("reload failed".to_string()));
        }
        Ok(())
    }
}

/// Host identity of a root caller.
pub fn root() -> HostInfo {
    HostInfo {
        hostname: "node1.example.com".to_string(),
        hostname_error: None,
        uid: 0,
    }
}

/// Report sink capturing JSON output.
pub fn machine_report() -> ReportBuilder<Vec<u8>> {
    ReportBuilder::new(Vec::new(), OutputMode::Machine)
}

/// Report sink capturing human output.
pub fn human_report() -> ReportBuilder<Vec<u8>> {
    ReportBuilder::new(Vec::new(), OutputMode::Human)
}

/// Parse the JSON document written to `report`.
pub fn document(report: ReportBuilder<Vec<u8>>) -> serde_json::Value {
    serde_json::from_slice(&report.into_inner()).expect("valid JSON document")
}
