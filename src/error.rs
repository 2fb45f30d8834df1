//! Domain-specific error types for the connection orchestrator.
//!
//! Internal modules return typed errors (e.g., [`FeatureError`],
//! [`PreconditionError`]) while the binary entry point converts the aggregate
//! [`RhcError`] into a process exit status via [`RhcError::exit_status`].
//!
//! # Error hierarchy
//!
//! ```text
//! RhcError
//! ├── Feature(FeatureError)            invalid feature request
//! ├── Registry(RegistryError)          invalid feature dependency graph
//! ├── Precondition(PreconditionError)  command cannot start
//! ├── Persistence(PersistenceError)    preference or marker file I/O
//! └── Config(ConfigError)              config file parsing
//! ```
//!
//! [`CollaboratorError`] is not part of [`RhcError`]: collaborator failures
//! are recorded per step and never abort a command on their own.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::orchestrator::StepKind;
use crate::report::ExitStatus;

/// Top-level error type for a single `rhc` invocation.
#[derive(Error, Debug)]
pub enum RhcError {
    /// Invalid feature request.
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// The feature registry failed validation.
    #[error("invalid feature registry: {0}")]
    Registry(#[from] RegistryError),

    /// A command precondition was not met.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// A state file could not be written.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RhcError {
    /// Exit status used when this error terminates the process.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Feature(_) | Self::Config(_) => ExitStatus::Usage,
            Self::Registry(_) => ExitStatus::Software,
            Self::Precondition(e) => e.exit_status(),
            Self::Persistence(_) => ExitStatus::Failure,
        }
    }
}

/// Errors produced while resolving a feature request against the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    /// The id does not name a known feature.
    #[error("unknown feature ID: '{0}'")]
    UnknownFeature(String),

    /// The feature is mandatory and can never be disabled.
    #[error("feature '{0}' is mandatory and cannot be disabled")]
    CannotDisable(String),

    /// The listed features would be both enabled and disabled.
    ///
    /// Ids are sorted lexicographically.
    #[error("features requested both enabled and disabled: {}", .0.join(", "))]
    Conflict(Vec<String>),
}

/// Errors detected while building the feature registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two features share an id.
    #[error("duplicate feature '{0}'")]
    DuplicateFeature(String),

    /// A feature requires an id that is not registered.
    #[error("feature '{feature}' requires unknown feature '{requirement}'")]
    UnknownRequirement {
        /// Feature declaring the requirement.
        feature: String,
        /// The missing requirement.
        requirement: String,
    },

    /// A mandatory feature requires an optional one.
    #[error("mandatory feature '{feature}' requires optional feature '{requirement}'")]
    OptionalRequirement {
        /// The mandatory feature.
        feature: String,
        /// The optional requirement.
        requirement: String,
    },

    /// The requires relation is not acyclic.
    #[error("feature dependency cycle detected: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
}

/// Precondition violations that abort a command before any side effect.
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// The subscription service already holds a consumer identity.
    #[error("this system is already connected")]
    AlreadyConnected,

    /// Every disconnect step is already in its target state.
    #[error("this system is already disconnected")]
    AlreadyDisconnected,

    /// The invoking user is not root.
    #[error("non-root user cannot {action} system")]
    PermissionDenied {
        /// Verb of the rejected command (`connect`, `disconnect`).
        action: &'static str,
    },

    /// The command line options are inconsistent.
    #[error("{0}")]
    InvalidArguments(String),

    /// The current connection state could not be determined.
    #[error("unable to get consumer UUID: {0}")]
    ConnectionProbe(String),
}

impl PreconditionError {
    /// Exit status for this precondition.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        match self {
            Self::AlreadyConnected | Self::AlreadyDisconnected | Self::InvalidArguments(_) => {
                ExitStatus::Usage
            }
            Self::PermissionDenied { .. } => ExitStatus::Failure,
            Self::ConnectionProbe(_) => ExitStatus::Software,
        }
    }
}

/// Failure to persist local state.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// File or directory I/O failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Path being written or removed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The preference document could not be serialized.
    #[error("failed to serialize feature preferences: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PersistenceError {
    /// Adapter for `map_err` attaching `path` to an I/O error.
    pub fn at(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + use<> {
        let path = path.to_path_buf();
        move |source| Self::Io { path, source }
    }
}

/// Errors raised while loading `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unexpected values.
    #[error("cannot parse config file {path}: {message}")]
    Parse {
        /// Path to the offending file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

/// A failure reported by an external collaborator during one step.
///
/// `context` names the sub-action that failed and `cause` preserves the
/// collaborator's own message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorError {
    /// Step during which the failure occurred.
    pub step: StepKind,
    /// Human-readable sub-action, e.g. `cannot activate the yggdrasil service`.
    pub context: String,
    /// Underlying collaborator message.
    pub cause: String,
}

impl CollaboratorError {
    /// Wrap `cause` with the step and sub-action it belongs to.
    pub fn new(step: StepKind, context: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            step,
            context: context.into(),
            cause: cause.to_string(),
        }
    }
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.cause)
    }
}

impl std::error::Error for CollaboratorError {}
