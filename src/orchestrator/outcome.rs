//! Per-run record of connect/disconnect step results.

use std::time::Duration;

use crate::error::CollaboratorError;

/// One of the three high-level steps of a connect or disconnect run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepKind {
    /// Registration with (or removal from) subscription management.
    Subscription,
    /// Registration of the telemetry client.
    Telemetry,
    /// Remote management service units.
    Services,
}

impl StepKind {
    /// Short label used in duration and error tables.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Subscription => "rhsm",
            Self::Telemetry => "insights",
            Self::Services => "yggdrasil",
        }
    }
}

/// Direction of an orchestrated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `Idle -> RegisteringSubscription -> RegisteringTelemetry -> ActivatingServices -> Done`
    Connect,
    /// `Idle -> DeactivatingServices -> UnregisteringTelemetry -> UnregisteringSubscription -> Done`
    Disconnect,
}

impl Direction {
    /// Fixed step order for this direction.
    #[must_use]
    pub const fn steps(self) -> [StepKind; 3] {
        match self {
            Self::Connect => [StepKind::Subscription, StepKind::Telemetry, StepKind::Services],
            Self::Disconnect => [StepKind::Services, StepKind::Telemetry, StepKind::Subscription],
        }
    }

    /// Verb used in report headings.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The run ended before reaching this step.
    NotAttempted,
    /// The collaborator call succeeded.
    Succeeded,
    /// The target state already held; nothing was done.
    AlreadySatisfied,
    /// The governing feature is disabled.
    Disabled {
        /// Why the feature is disabled, when it was forced off by a requirement.
        reason: Option<String>,
    },
    /// A prior step failed so this one was not run.
    Skipped,
    /// The collaborator call failed.
    Failed(CollaboratorError),
}

impl StepStatus {
    /// `true` for outcomes that leave the step in its target state.
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Succeeded | Self::AlreadySatisfied)
    }

    /// The recorded error, if the step failed.
    #[must_use]
    pub const fn error(&self) -> Option<&CollaboratorError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Status and elapsed time of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Which step this is.
    pub kind: StepKind,
    /// What happened.
    pub status: StepStatus,
    /// Wall-clock time spent in the step.
    pub duration: Duration,
}

/// Per-feature result reported by `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureOutcome {
    /// Feature id.
    pub id: &'static str,
    /// Whether the feature was wanted for this run.
    pub enabled: bool,
    /// Whether the feature ended up active.
    pub successful: bool,
    /// Skipped because an earlier step failed.
    pub skipped: bool,
    /// Failure message, if the feature's step failed.
    pub error: Option<String>,
}

/// Accumulated outcome of one connect or disconnect invocation.
///
/// Every step of the direction is always present, initially
/// [`StepStatus::NotAttempted`], so consumers never see a missing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOutcome {
    direction: Direction,
    steps: Vec<StepOutcome>,
    features: Vec<FeatureOutcome>,
}

impl ConnectionOutcome {
    /// Create an outcome with every step not yet attempted.
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            steps: direction
                .steps()
                .into_iter()
                .map(|kind| StepOutcome {
                    kind,
                    status: StepStatus::NotAttempted,
                    duration: Duration::ZERO,
                })
                .collect(),
            features: Vec::new(),
        }
    }

    /// Direction of this run.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[StepOutcome] {
        &self.steps
    }

    /// Outcome of `kind`.
    #[must_use]
    pub fn step(&self, kind: StepKind) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    /// Status of `kind`, [`StepStatus::NotAttempted`] if absent.
    #[must_use]
    pub fn status(&self, kind: StepKind) -> &StepStatus {
        static NOT_ATTEMPTED: StepStatus = StepStatus::NotAttempted;
        self.step(kind).map_or(&NOT_ATTEMPTED, |s| &s.status)
    }

    /// Record the result of `kind`.
    pub fn record(&mut self, kind: StepKind, status: StepStatus, duration: Duration) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.kind == kind) {
            step.status = status;
            step.duration = duration;
        }
    }

    /// Per-feature results.
    #[must_use]
    pub fn features(&self) -> &[FeatureOutcome] {
        &self.features
    }

    /// Result for feature `id`.
    #[must_use]
    pub fn feature(&self, id: &str) -> Option<&FeatureOutcome> {
        self.features.iter().find(|f| f.id == id)
    }

    /// Add or replace a feature result.
    pub fn record_feature(&mut self, outcome: FeatureOutcome) {
        if let Some(existing) = self.features.iter_mut().find(|f| f.id == outcome.id) {
            *existing = outcome;
        } else {
            self.features.push(outcome);
        }
    }

    /// Collected step errors in step order.
    pub fn errors(&self) -> impl Iterator<Item = &CollaboratorError> {
        self.steps.iter().filter_map(|s| s.status.error())
    }

    /// `true` when any step failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}
