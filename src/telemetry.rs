//! Telemetry (Red Hat Lightspeed) collaborator.
//!
//! The client is a black-box executable; registration state is read from
//! its exit status and standard error.
use std::sync::Arc;

use thiserror::Error;

use crate::exec::Executor;

/// Default location of the telemetry client.
pub const DEFAULT_PROGRAM: &str = "/usr/bin/insights-client";

/// Errors returned by the telemetry client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// The client binary is not installed.
    #[error("{0} is not installed")]
    NotInstalled(String),

    /// The client could not be started.
    #[error("cannot execute {program}: {message}")]
    Spawn {
        /// Program path.
        program: String,
        /// Spawn failure.
        message: String,
    },

    /// The client ran and reported a failure.
    #[error("{}", failure_message(.flag, .code.as_ref().copied(), .stderr))]
    Failed {
        /// Flag the client was invoked with.
        flag: &'static str,
        /// Exit code, if any.
        code: Option<i32>,
        /// Trimmed standard error.
        stderr: String,
    },
}

fn failure_message(flag: &str, code: Option<i32>, stderr: &str) -> String {
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match code {
        Some(code) => format!("{flag} exited with status {code}"),
        None => format!("{flag} was terminated by a signal"),
    }
}

/// Registration operations of the telemetry client.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetryClient: Send + Sync {
    /// Register this host.
    ///
    /// # Errors
    ///
    /// Returns an error if the client fails.
    fn register(&self) -> Result<(), TelemetryError>;

    /// Unregister this host.
    ///
    /// # Errors
    ///
    /// Returns an error if the client fails.
    fn unregister(&self) -> Result<(), TelemetryError>;

    /// Whether the host is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined.
    fn is_registered(&self) -> Result<bool, TelemetryError>;
}

/// [`TelemetryClient`] running the `insights-client` executable.
#[derive(Debug, Clone)]
pub struct InsightsClient {
    program: String,
    executor: Arc<dyn Executor>,
}

impl InsightsClient {
    /// Client invoking `program` through `executor`.
    #[must_use]
    pub fn new(program: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        Self {
            program: program.into(),
            executor,
        }
    }

    fn run(&self, flag: &'static str) -> Result<crate::exec::ExecResult, TelemetryError> {
        if !self.executor.which(&self.program) {
            return Err(TelemetryError::NotInstalled(self.program.clone()));
        }
        self.executor
            .run_unchecked(&self.program, &[flag])
            .map_err(|e| TelemetryError::Spawn {
                program: self.program.clone(),
                message: format!("{e:#}"),
            })
    }

    fn run_checked(&self, flag: &'static str) -> Result<(), TelemetryError> {
        let result = self.run(flag)?;
        if result.success {
            Ok(())
        } else {
            Err(TelemetryError::Failed {
                flag,
                code: result.code,
                stderr: result.stderr.trim().to_string(),
            })
        }
    }
}

impl TelemetryClient for InsightsClient {
    fn register(&self) -> Result<(), TelemetryError> {
        self.run_checked("--register")
    }

    fn unregister(&self) -> Result<(), TelemetryError> {
        self.run_checked("--unregister")
    }

    fn is_registered(&self) -> Result<bool, TelemetryError> {
        let result = self.run("--status")?;
        if result.success {
            return Ok(true);
        }
        let stderr = result.stderr.trim();
        if stderr.is_empty() {
            Ok(false)
        } else {
            Err(TelemetryError::Failed {
                flag: "--status",
                code: result.code,
                stderr: stderr.to_string(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;

    fn client(mock: MockExecutor) -> (Arc<MockExecutor>, InsightsClient) {
        let mock = Arc::new(mock);
        let client = InsightsClient::new(DEFAULT_PROGRAM, Arc::clone(&mock) as Arc<dyn Executor>);
        (mock, client)
    }

    #[test]
    fn register_passes_flag() {
        let (mock, client) = client(MockExecutor::with_responses(vec![(0, "", "")]));
        client.register().unwrap();
        assert_eq!(mock.calls(), vec!["/usr/bin/insights-client --register"]);
    }

    #[test]
    fn unregister_failure_carries_stderr() {
        let (_mock, client) = client(MockExecutor::with_responses(vec![(
            1,
            "",
            "  not registered\n",
        )]));
        let err = client.unregister().unwrap_err();
        assert_eq!(err.to_string(), "not registered");
    }

    #[test]
    fn failure_without_stderr_names_exit_status() {
        let (_mock, client) = client(MockExecutor::with_responses(vec![(2, "", "")]));
        let err = client.register().unwrap_err();
        assert_eq!(err.to_string(), "--register exited with status 2");
    }

    #[test]
    fn status_success_means_registered() {
        let (_mock, client) = client(MockExecutor::with_responses(vec![(0, "Registered", "")]));
        assert!(client.is_registered().unwrap());
    }

    #[test]
    fn status_failure_without_stderr_means_unregistered() {
        let (_mock, client) = client(MockExecutor::with_responses(vec![(1, "", "")]));
        assert!(!client.is_registered().unwrap());
    }

    #[test]
    fn status_failure_with_stderr_is_an_error() {
        let (_mock, client) = client(MockExecutor::with_responses(vec![(
            1,
            "",
            "Unable to reach the server\n",
        )]));
        let err = client.is_registered().unwrap_err();
        assert_eq!(err.to_string(), "Unable to reach the server");
    }

    #[test]
    fn missing_binary_is_reported() {
        let (mock, client) = client(MockExecutor::with_responses(vec![]).not_installed());
        let err = client.is_registered().unwrap_err();
        assert_eq!(err, TelemetryError::NotInstalled(DEFAULT_PROGRAM.to_string()));
        assert!(mock.calls().is_empty());
    }
}
