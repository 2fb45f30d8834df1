//! Process execution behind an injectable [`Executor`] trait.
use anyhow::{Context as _, Result};
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Runs external programs.
///
/// Production code uses [`SystemExecutor`]; tests substitute a scripted
/// implementation so collaborator adapters can be exercised without the
/// real binaries installed.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run `program` with `args` and return its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be spawned.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Returns `true` if `program` resolves to an executable.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        tracing::debug!("executing {program} {}", args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Shared test double for [`Executor`].
#[cfg(test)]
pub mod test_helpers {
    use super::{ExecResult, Executor};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted executor returning queued `(exit code, stdout, stderr)` triples in
    /// FIFO order and recording every invocation.
    ///
    /// When the queue is empty any call returns exit code 1 with stderr
    /// `"unexpected call"`.
    #[derive(Debug)]
    pub struct MockExecutor {
        responses: Mutex<VecDeque<(i32, String, String)>>,
        calls: Mutex<Vec<String>>,
        installed: bool,
    }

    impl MockExecutor {
        /// Create a mock from an ordered list of `(code, stdout, stderr)` triples.
        #[must_use]
        pub fn with_responses(responses: Vec<(i32, &str, &str)>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|(c, o, e)| (c, o.to_string(), e.to_string()))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
                installed: true,
            }
        }

        /// Pretend no program is installed.
        #[must_use]
        pub const fn not_installed(mut self) -> Self {
            self.installed = false;
            self
        }

        /// Command lines seen so far, as `"program arg..."`.
        #[must_use]
        pub fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .map_or_else(|_| Vec::new(), |c| c.clone())
        }
    }

    impl Executor for MockExecutor {
        fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
            if let Ok(mut calls) = self.calls.lock() {
                let mut line = program.to_string();
                for arg in args {
                    line.push(' ');
                    line.push_str(arg);
                }
                calls.push(line);
            }
            let (code, stdout, stderr) = self
                .responses
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| (1, String::new(), "unexpected call".to_string()));
            Ok(ExecResult {
                stdout,
                stderr,
                success: code == 0,
                code: Some(code),
            })
        }

        fn which(&self, _: &str) -> bool {
            self.installed
        }
    }
}
