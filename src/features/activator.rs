//! Apply a [`ResolvedPlan`] feature by feature.
use super::{FeaturePreferences, ResolvedPlan};
use crate::context::Context;
use crate::error::CollaboratorError;

/// What happened to one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationStatus {
    /// The feature was switched on.
    Enabled,
    /// The feature was switched off.
    Disabled,
    /// The feature was already in the wanted state.
    AlreadyInState,
    /// The collaborator call failed.
    Failed(CollaboratorError),
}

/// Result of applying the plan to one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    /// Feature id.
    pub id: &'static str,
    /// `true` when the plan wanted the feature on.
    pub target: bool,
    /// Outcome.
    pub status: ActivationStatus,
}

/// Everything [`activate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// Per-feature results: disables (most dependent first), then enables
    /// (least dependent first).
    pub activations: Vec<Activation>,
    /// Preferences after applying the plan.
    pub preferences: FeaturePreferences,
    /// `true` if the preferences were written to disk.
    pub persisted: bool,
    /// Why writing the preferences failed.
    pub persist_error: Option<String>,
}

impl ActivationReport {
    /// Failed features in processing order.
    pub fn errors(&self) -> impl Iterator<Item = (&'static str, &CollaboratorError)> {
        self.activations.iter().filter_map(|a| match &a.status {
            ActivationStatus::Failed(e) => Some((a.id, e)),
            _ => None,
        })
    }

    /// `true` when any feature failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Apply `plan` on top of `prefs`.
///
/// Disables run first, walking the registry from the most dependent
/// feature down; enables follow, walking up from the roots. A feature
/// already in the wanted state is left alone. Before the host is connected
/// only the preferences change and are saved afterwards; once connected the
/// features' collaborators are called and nothing is saved.
///
/// Failures never stop the walk; they are collected in the report.
/// Mandatory features are always on and are not visited.
#[must_use]
pub fn activate(
    ctx: &Context,
    plan: &ResolvedPlan,
    prefs: &FeaturePreferences,
    connected: bool,
) -> ActivationReport {
    let registry = &ctx.registry;
    let mut next = prefs.clone();
    let mut activations = Vec::new();

    let disables = registry
        .iter()
        .rev()
        .filter(|f| !f.mandatory() && plan.to_disable.contains(f.id()));
    for feature in disables {
        let status = if !feature.is_enabled_now(ctx, prefs, connected) {
            ActivationStatus::AlreadyInState
        } else if !connected {
            ActivationStatus::Disabled
        } else {
            match feature.deactivate(ctx) {
                Ok(()) => ActivationStatus::Disabled,
                Err(e) => {
                    tracing::error!("{e}");
                    ActivationStatus::Failed(e)
                }
            }
        };
        next.set(feature.id(), false);
        activations.push(Activation {
            id: feature.id(),
            target: false,
            status,
        });
    }

    let enables = registry
        .iter()
        .filter(|f| !f.mandatory() && plan.to_enable.contains(f.id()));
    for feature in enables {
        let status = if feature.is_enabled_now(ctx, prefs, connected) {
            ActivationStatus::AlreadyInState
        } else if !connected {
            ActivationStatus::Enabled
        } else {
            match feature.activate(ctx) {
                Ok(()) => ActivationStatus::Enabled,
                Err(e) => {
                    tracing::error!("{e}");
                    ActivationStatus::Failed(e)
                }
            }
        };
        next.set(feature.id(), true);
        activations.push(Activation {
            id: feature.id(),
            target: true,
            status,
        });
    }

    let (persisted, persist_error) = if connected {
        tracing::debug!("host is connected; feature preferences not saved");
        (false, None)
    } else {
        match ctx.preferences.save(&next, registry) {
            Ok(()) => (true, None),
            Err(e) => {
                tracing::warn!("{e}");
                (false, Some(e.to_string()))
            }
        }
    };

    ActivationReport {
        activations,
        preferences: next,
        persisted,
        persist_error,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::context::test_helpers::context_with_registry;
    use crate::features::test_helpers::StubFeature;
    use crate::features::{Feature, FeatureRegistry, resolve};

    const NONE: &[&str] = &[];

    fn registry(calls: &Arc<Mutex<Vec<String>>>, live: &[&str], failing: &[&str]) -> FeatureRegistry {
        let make = |id: &'static str, requires: &'static [&'static str]| {
            let mut f = StubFeature::new(id, requires, calls);
            if live.contains(&id) {
                f = f.live();
            }
            if failing.contains(&id) {
                f = f.failing();
            }
            Box::new(f) as Box<dyn Feature>
        };
        FeatureRegistry::new(vec![
            Box::new(StubFeature::new("identity", &[], calls).mandatory().live()) as Box<dyn Feature>,
            make("content", &["identity"]),
            make("analytics", &["content"]),
            make("remote-management", &["analytics"]),
        ])
        .unwrap()
    }

    fn log(calls: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        calls.lock().unwrap().clone()
    }

    #[test]
    fn disables_run_most_dependent_first() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, ctx) = context_with_registry(registry(
            &calls,
            &["content", "analytics", "remote-management"],
            &[],
        ));
        let plan = resolve(&ctx.registry, NONE, &["content"]).unwrap();
        let report = activate(&ctx, &plan, &FeaturePreferences::default(), true);
        assert_eq!(
            log(&calls),
            vec!["-remote-management", "-analytics", "-content"]
        );
        assert!(!report.has_errors());
        assert!(!report.persisted);
    }

    #[test]
    fn enables_run_least_dependent_first_and_skip_active() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, ctx) = context_with_registry(registry(&calls, &["content"], &[]));
        let plan = resolve(&ctx.registry, &["remote-management"], NONE).unwrap();
        let report = activate(&ctx, &plan, &FeaturePreferences::default(), true);
        assert_eq!(log(&calls), vec!["+analytics", "+remote-management"]);
        assert_eq!(report.activations[0].id, "content");
        assert_eq!(report.activations[0].status, ActivationStatus::AlreadyInState);
        assert!(report.activations.iter().all(|a| a.id != "identity"));
    }

    #[test]
    fn failures_do_not_stop_the_walk() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, ctx) = context_with_registry(registry(&calls, &[], &["analytics"]));
        let plan = resolve(&ctx.registry, &["remote-management"], NONE).unwrap();
        let report = activate(&ctx, &plan, &FeaturePreferences::default(), true);
        assert_eq!(
            log(&calls),
            vec!["+content", "+analytics", "+remote-management"]
        );
        let failed: Vec<&str> = report.errors().map(|(id, _)| id).collect();
        assert_eq!(failed, vec!["analytics"]);
    }

    #[test]
    fn disconnected_host_only_updates_preferences() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, ctx) = context_with_registry(registry(&calls, &[], &[]));
        let plan = resolve(&ctx.registry, NONE, &["analytics"]).unwrap();
        let report = activate(&ctx, &plan, &FeaturePreferences::default(), false);

        assert!(log(&calls).is_empty());
        assert!(report.persisted);
        assert!(!report.preferences.is_enabled("analytics"));
        assert!(!report.preferences.is_enabled("remote-management"));

        let saved = ctx.preferences.load(&ctx.registry);
        for id in ["content", "analytics", "remote-management"] {
            assert_eq!(saved.is_enabled(id), report.preferences.is_enabled(id));
        }
    }

    #[test]
    fn already_disabled_preference_is_reported() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, ctx) = context_with_registry(registry(&calls, &[], &[]));
        let mut prefs = FeaturePreferences::default();
        prefs.set("remote-management", false);
        let plan = resolve(&ctx.registry, NONE, &["remote-management"]).unwrap();
        let report = activate(&ctx, &plan, &prefs, false);
        assert_eq!(report.activations.len(), 1);
        assert_eq!(report.activations[0].status, ActivationStatus::AlreadyInState);
    }
}
