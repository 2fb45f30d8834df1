//! Named, dependency-ordered features a user can switch on and off.
//!
//! A [`Feature`] describes one capability of a connected host together with
//! the collaborator calls that switch it on or off. Features are collected
//! in a validated [`FeatureRegistry`]; user requests are turned into a
//! [`ResolvedPlan`] by [`resolve`] and applied by [`activate`].
pub mod activator;
pub mod builtin;
pub mod graph;
pub mod preferences;
pub mod registry;
pub mod resolver;

pub use activator::{Activation, ActivationReport, ActivationStatus, activate};
pub use preferences::{FeaturePreferences, PreferenceStore};
pub use registry::FeatureRegistry;
pub use resolver::{ResolvedPlan, resolve};

use crate::context::Context;
use crate::error::CollaboratorError;

/// One optional capability of a connected host.
///
/// The `'static` bound lets the registry hand out `&'static str` ids and
/// store features as trait objects for the lifetime of the process.
pub trait Feature: Send + Sync + 'static {
    /// Stable id, e.g. `analytics`.
    fn id(&self) -> &'static str;

    /// One-line human description.
    fn description(&self) -> &'static str;

    /// Ids of the features this one depends on.
    ///
    /// The default implementation returns an empty slice (a root feature).
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    /// Mandatory features are always enabled and can never be disabled.
    fn mandatory(&self) -> bool {
        false
    }

    /// Query the live system for whether this feature is currently active.
    ///
    /// Only meaningful once the host is connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the owning collaborator cannot be queried.
    fn live_state(&self, ctx: &Context) -> Result<bool, CollaboratorError>;

    /// Switch the feature on in the live system.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator call fails.
    fn activate(&self, ctx: &Context) -> Result<(), CollaboratorError>;

    /// Switch the feature off in the live system.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator call fails.
    fn deactivate(&self, ctx: &Context) -> Result<(), CollaboratorError>;

    /// Whether the feature is on right now.
    ///
    /// Connected hosts are asked directly; a probe failure counts as
    /// disabled. Before connecting, the stored preference is the only
    /// source of truth.
    fn is_enabled_now(&self, ctx: &Context, prefs: &FeaturePreferences, connected: bool) -> bool {
        if self.mandatory() {
            return true;
        }
        if !connected {
            return prefs.is_enabled(self.id());
        }
        match self.live_state(ctx) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("cannot determine state of feature '{}': {e}", self.id());
                false
            }
        }
    }
}

impl std::fmt::Debug for dyn Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feature")
            .field("id", &self.id())
            .field("requires", &self.requires())
            .field("mandatory", &self.mandatory())
            .finish()
    }
}

/// Shared helpers for feature unit tests.
#[cfg(test)]
pub mod test_helpers {
    use std::sync::{Arc, Mutex};

    use super::{Feature, FeatureRegistry};
    use crate::context::Context;
    use crate::error::CollaboratorError;
    use crate::orchestrator::StepKind;

    /// In-memory feature recording activate/deactivate calls.
    #[derive(Debug)]
    pub struct StubFeature {
        /// Feature id.
        pub id: &'static str,
        /// Requirements.
        pub requires: &'static [&'static str],
        /// Mandatory flag.
        pub mandatory: bool,
        /// Live state returned by `live_state`.
        pub live: bool,
        /// Make `activate`/`deactivate` fail.
        pub fail: bool,
        /// Shared call log, e.g. `+content`, `-analytics`.
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl StubFeature {
        /// Optional feature with the given requirements.
        pub fn new(
            id: &'static str,
            requires: &'static [&'static str],
            calls: &Arc<Mutex<Vec<String>>>,
        ) -> Self {
            Self {
                id,
                requires,
                mandatory: false,
                live: false,
                fail: false,
                calls: Arc::clone(calls),
            }
        }

        /// Mark as mandatory.
        #[must_use]
        pub const fn mandatory(mut self) -> Self {
            self.mandatory = true;
            self
        }

        /// Report as currently active.
        #[must_use]
        pub const fn live(mut self) -> Self {
            self.live = true;
            self
        }

        /// Fail every state change.
        #[must_use]
        pub const fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn change(&self, sign: char) -> Result<(), CollaboratorError> {
            self.calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(format!("{sign}{}", self.id));
            if self.fail {
                Err(CollaboratorError::new(
                    StepKind::Services,
                    format!("failed to change {}", self.id),
                    "stub failure",
                ))
            } else {
                Ok(())
            }
        }
    }

    impl Feature for StubFeature {
        fn id(&self) -> &'static str {
            self.id
        }

        fn description(&self) -> &'static str {
            "stub"
        }

        fn requires(&self) -> &'static [&'static str] {
            self.requires
        }

        fn mandatory(&self) -> bool {
            self.mandatory
        }

        fn live_state(&self, _: &Context) -> Result<bool, CollaboratorError> {
            Ok(self.live)
        }

        fn activate(&self, _: &Context) -> Result<(), CollaboratorError> {
            self.change('+')
        }

        fn deactivate(&self, _: &Context) -> Result<(), CollaboratorError> {
            self.change('-')
        }
    }

    /// `content <- analytics <- remote-management`, no mandatory root.
    #[allow(clippy::expect_used)]
    pub fn chain_registry() -> FeatureRegistry {
        let calls = Arc::new(Mutex::new(Vec::new()));
        FeatureRegistry::new(vec![
            Box::new(StubFeature::new("content", &[], &calls)),
            Box::new(StubFeature::new("analytics", &["content"], &calls)),
            Box::new(StubFeature::new("remote-management", &["analytics"], &calls)),
        ])
        .expect("chain registry is valid")
    }
}
