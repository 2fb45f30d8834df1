//! Validated, topologically ordered table of known features.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::graph;
use super::{Feature, FeaturePreferences};
use crate::error::RegistryError;

/// Immutable table of all known features.
///
/// Iteration yields features least-dependent first: every feature comes
/// after everything it requires, and independent features keep their
/// declaration order.
#[derive(Debug)]
pub struct FeatureRegistry {
    features: Vec<Box<dyn Feature>>,
    index: HashMap<&'static str, usize>,
}

impl FeatureRegistry {
    /// Validate `features` and order them topologically.
    ///
    /// # Errors
    ///
    /// Returns an error if an id is declared twice, a requirement names an
    /// unknown id, a mandatory feature requires an optional one, or the
    /// requirements form a cycle.
    pub fn new(features: Vec<Box<dyn Feature>>) -> Result<Self, RegistryError> {
        let mut declared: HashMap<&'static str, usize> = HashMap::new();
        for (i, f) in features.iter().enumerate() {
            if declared.insert(f.id(), i).is_some() {
                return Err(RegistryError::DuplicateFeature(f.id().to_string()));
            }
        }

        let mut edges = Vec::with_capacity(features.len());
        for f in &features {
            let mut deps = Vec::with_capacity(f.requires().len());
            for &req in f.requires() {
                let Some(&idx) = declared.get(req) else {
                    return Err(RegistryError::UnknownRequirement {
                        feature: f.id().to_string(),
                        requirement: req.to_string(),
                    });
                };
                if f.mandatory() && !features.get(idx).is_some_and(|r| r.mandatory()) {
                    return Err(RegistryError::OptionalRequirement {
                        feature: f.id().to_string(),
                        requirement: req.to_string(),
                    });
                }
                deps.push(idx);
            }
            edges.push(deps);
        }

        let order = graph::topological_order(&edges).map_err(|stuck| {
            let mut ids: Vec<String> = stuck
                .iter()
                .filter_map(|&i| features.get(i).map(|f| f.id().to_string()))
                .collect();
            ids.sort();
            RegistryError::DependencyCycle(ids)
        })?;

        let mut slots: Vec<Option<Box<dyn Feature>>> = features.into_iter().map(Some).collect();
        let ordered: Vec<Box<dyn Feature>> = order
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .collect();
        let index = ordered
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id(), i))
            .collect();

        tracing::debug!(
            "feature registry: {}",
            ordered.iter().map(|f| f.id()).collect::<Vec<_>>().join(", ")
        );
        Ok(Self {
            features: ordered,
            index,
        })
    }

    /// The registry of features shipped with `rhc`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in table fails validation.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(super::builtin::all_features())
    }

    /// Look up a feature by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn Feature> {
        self.index
            .get(id)
            .and_then(|&i| self.features.get(i))
            .map(AsRef::as_ref)
    }

    /// Registry position of `id`; lower positions are less dependent.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Features in topological order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &dyn Feature> {
        self.features.iter().map(AsRef::as_ref)
    }

    /// Feature ids in topological order.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = &'static str> + '_ {
        self.features.iter().map(|f| f.id())
    }

    /// Canonical (registry-owned) form of `id`.
    #[must_use]
    pub fn canonical(&self, id: &str) -> Option<&'static str> {
        self.get(id).map(|f| f.id())
    }

    /// Features that directly require `id`.
    pub fn dependents<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'static str> + 'a {
        self.features
            .iter()
            .filter(move |f| f.requires().iter().any(|r| *r == id))
            .map(|f| f.id())
    }

    /// Every feature `id` requires, directly or transitively.
    #[must_use]
    pub fn requirements_of(&self, id: &str) -> BTreeSet<&'static str> {
        let mut found = BTreeSet::new();
        let mut pending: Vec<&'static str> = self
            .get(id)
            .map(|f| f.requires().to_vec())
            .unwrap_or_default();
        while let Some(next) = pending.pop() {
            if found.insert(next)
                && let Some(f) = self.get(next)
            {
                pending.extend_from_slice(f.requires());
            }
        }
        found
    }

    /// Disable every feature whose requirement is disabled.
    ///
    /// Walks the registry in topological order so a disabled requirement
    /// propagates through the whole chain. Returns the reason recorded for
    /// each feature that was switched off.
    pub fn normalize(&self, prefs: &mut FeaturePreferences) -> BTreeMap<&'static str, String> {
        let mut reasons = BTreeMap::new();
        for f in self.iter().filter(|f| !f.mandatory()) {
            if !prefs.is_enabled(f.id()) {
                continue;
            }
            let disabled_req = f.requires().iter().find(|&&req| {
                self.get(req).is_some_and(|r| !r.mandatory()) && !prefs.is_enabled(req)
            });
            if let Some(req) = disabled_req {
                tracing::debug!("disabling '{}': requirement '{req}' is disabled", f.id());
                prefs.set(f.id(), false);
                reasons.insert(f.id(), format!("required feature \"{req}\" is disabled"));
            }
        }
        reasons
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::features::test_helpers::{StubFeature, chain_registry};

    fn calls() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn orders_requirements_first() {
        let c = calls();
        let registry = FeatureRegistry::new(vec![
            Box::new(StubFeature::new("remote-management", &["analytics"], &c)),
            Box::new(StubFeature::new("analytics", &["content"], &c)),
            Box::new(StubFeature::new("content", &[], &c)),
        ])
        .unwrap();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, vec!["content", "analytics", "remote-management"]);
        assert_eq!(registry.position("analytics"), Some(1));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let c = calls();
        let err = FeatureRegistry::new(vec![
            Box::new(StubFeature::new("content", &[], &c)),
            Box::new(StubFeature::new("content", &[], &c)),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateFeature("content".to_string()));
    }

    #[test]
    fn rejects_unknown_requirement() {
        let c = calls();
        let err = FeatureRegistry::new(vec![Box::new(StubFeature::new(
            "analytics",
            &["content"],
            &c,
        ))])
        .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownRequirement { .. }));
    }

    #[test]
    fn rejects_cycles_listing_sorted_ids() {
        let c = calls();
        let err = FeatureRegistry::new(vec![
            Box::new(StubFeature::new("root", &[], &c)),
            Box::new(StubFeature::new("b", &["a"], &c)),
            Box::new(StubFeature::new("a", &["b"], &c)),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DependencyCycle(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn rejects_mandatory_requiring_optional() {
        let c = calls();
        let err = FeatureRegistry::new(vec![
            Box::new(StubFeature::new("content", &[], &c)),
            Box::new(StubFeature::new("identity", &["content"], &c).mandatory()),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::OptionalRequirement { .. }));
    }

    #[test]
    fn builtin_registry_is_valid() {
        let registry = FeatureRegistry::builtin().unwrap();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(
            ids,
            vec!["identity", "content", "analytics", "remote-management"]
        );
        assert!(registry.get("identity").unwrap().mandatory());
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn dependents_are_direct_only() {
        let registry = chain_registry();
        let deps: Vec<&str> = registry.dependents("content").collect();
        assert_eq!(deps, vec!["analytics"]);
    }

    #[test]
    fn requirements_are_transitive() {
        let registry = chain_registry();
        let reqs: Vec<&str> = registry
            .requirements_of("remote-management")
            .into_iter()
            .collect();
        assert_eq!(reqs, vec!["analytics", "content"]);
        assert!(registry.requirements_of("content").is_empty());
    }

    #[test]
    fn canonical_returns_static_id() {
        let registry = chain_registry();
        assert_eq!(registry.canonical("analytics"), Some("analytics"));
        assert_eq!(registry.canonical("telepathy"), None);
    }

    // -----------------------------------------------------------------------
    // normalize
    // -----------------------------------------------------------------------

    #[test]
    fn normalize_propagates_disabled_requirement() {
        let registry = chain_registry();
        let mut prefs = FeaturePreferences::default();
        prefs.set("content", false);
        let reasons = registry.normalize(&mut prefs);
        assert!(!prefs.is_enabled("analytics"));
        assert!(!prefs.is_enabled("remote-management"));
        assert_eq!(
            reasons.get("analytics").map(String::as_str),
            Some("required feature \"content\" is disabled")
        );
        assert_eq!(
            reasons.get("remote-management").map(String::as_str),
            Some("required feature \"analytics\" is disabled")
        );
    }

    #[test]
    fn normalize_leaves_consistent_preferences_alone() {
        let registry = chain_registry();
        let mut prefs = FeaturePreferences::default();
        prefs.set("remote-management", false);
        let reasons = registry.normalize(&mut prefs);
        assert!(reasons.is_empty());
        assert!(prefs.is_enabled("analytics"));
    }
}
