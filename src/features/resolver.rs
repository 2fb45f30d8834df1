//! Turn enable/disable requests into a dependency-closed plan.
use std::collections::BTreeSet;

use super::{FeaturePreferences, FeatureRegistry};
use crate::error::FeatureError;

/// Features to switch on and off for one request.
///
/// Both sets are closed over the requires relation and disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPlan {
    /// Requested features plus everything they require.
    pub to_enable: BTreeSet<&'static str>,
    /// Requested features plus everything that depends on them.
    pub to_disable: BTreeSet<&'static str>,
}

impl ResolvedPlan {
    /// `true` when the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_enable.is_empty() && self.to_disable.is_empty()
    }

    /// `prefs` with this plan applied. Mandatory features are left out.
    #[must_use]
    pub fn apply(&self, registry: &FeatureRegistry, prefs: &FeaturePreferences) -> FeaturePreferences {
        let mut next = prefs.clone();
        let optional = |id: &str| registry.get(id).is_some_and(|f| !f.mandatory());
        for id in self.to_enable.iter().copied().filter(|&id| optional(id)) {
            next.set(id, true);
        }
        for id in self.to_disable.iter().copied().filter(|&id| optional(id)) {
            next.set(id, false);
        }
        next
    }

    /// The part of this plan that `prefs` does not already reflect.
    #[must_use]
    pub fn delta(&self, registry: &FeatureRegistry, prefs: &FeaturePreferences) -> Self {
        let mandatory = |id: &str| registry.get(id).is_some_and(|f| f.mandatory());
        Self {
            to_enable: self
                .to_enable
                .iter()
                .copied()
                .filter(|&id| !mandatory(id) && !prefs.is_enabled(id))
                .collect(),
            to_disable: self
                .to_disable
                .iter()
                .copied()
                .filter(|&id| prefs.is_enabled(id))
                .collect(),
        }
    }
}

fn lookup<S: AsRef<str>>(
    registry: &FeatureRegistry,
    ids: &[S],
) -> Result<BTreeSet<&'static str>, FeatureError> {
    ids.iter()
        .map(|id| {
            registry
                .canonical(id.as_ref())
                .ok_or_else(|| FeatureError::UnknownFeature(id.as_ref().to_string()))
        })
        .collect()
}

/// Resolve a request against `registry`.
///
/// Duplicate ids are tolerated. The enable set is closed under the requires
/// relation and the disable set under its reverse; the two closures must
/// not overlap.
///
/// # Errors
///
/// * [`FeatureError::UnknownFeature`] for an id not in the registry.
/// * [`FeatureError::CannotDisable`] when a mandatory feature is in `disable`.
/// * [`FeatureError::Conflict`] listing, sorted, every id that ends up in
///   both closures.
pub fn resolve<S: AsRef<str>>(
    registry: &FeatureRegistry,
    enable: &[S],
    disable: &[S],
) -> Result<ResolvedPlan, FeatureError> {
    let mut to_disable = lookup(registry, disable)?;
    let mut to_enable = lookup(registry, enable)?;

    if let Some(id) = to_disable
        .iter()
        .find(|id| registry.get(id).is_some_and(|f| f.mandatory()))
    {
        return Err(FeatureError::CannotDisable((*id).to_string()));
    }

    // Fixpoint: add requirements of enabled features.
    loop {
        let missing: Vec<&'static str> = to_enable
            .iter()
            .filter_map(|id| registry.get(id))
            .flat_map(|f| f.requires().iter().copied())
            .filter(|req| !to_enable.contains(req))
            .collect();
        if missing.is_empty() {
            break;
        }
        to_enable.extend(missing);
    }

    // Fixpoint: add dependents of disabled features.
    loop {
        let missing: Vec<&'static str> = to_disable
            .iter()
            .flat_map(|id| registry.dependents(id))
            .filter(|dep| !to_disable.contains(dep))
            .collect();
        if missing.is_empty() {
            break;
        }
        to_disable.extend(missing);
    }

    let conflicts: Vec<String> = to_enable
        .intersection(&to_disable)
        .map(ToString::to_string)
        .collect();
    if !conflicts.is_empty() {
        return Err(FeatureError::Conflict(conflicts));
    }

    tracing::debug!(
        "resolved plan: enable [{}], disable [{}]",
        to_enable.iter().copied().collect::<Vec<_>>().join(", "),
        to_disable.iter().copied().collect::<Vec<_>>().join(", ")
    );
    Ok(ResolvedPlan {
        to_enable,
        to_disable,
    })
}
