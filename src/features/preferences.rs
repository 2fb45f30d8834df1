//! Persisted feature preferences.
//!
//! The document is a flat JSON object mapping feature ids to booleans:
//!
//! ```json
//! {
//!     "content": true,
//!     "analytics": false,
//!     "remote-management": false
//! }
//! ```
//!
//! A missing or `null` entry means "use the default" (enabled). Mandatory
//! features are never written.
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::ser::Serializer;

use super::FeatureRegistry;
use crate::error::PersistenceError;
use crate::report::document::to_pretty_json;

/// File name of the preference document inside the state directory.
pub const FILE_NAME: &str = "rhc-connect-features-prefs.json";

/// Desired on/off state per feature id.
///
/// Features without an explicit entry are wanted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeaturePreferences {
    wanted: BTreeMap<String, bool>,
}

impl FeaturePreferences {
    /// Whether `id` is wanted. Defaults to `true`.
    #[must_use]
    pub fn is_enabled(&self, id: &str) -> bool {
        self.wanted.get(id).copied().unwrap_or(true)
    }

    /// Explicit value stored for `id`, if any.
    #[must_use]
    pub fn explicit(&self, id: &str) -> Option<bool> {
        self.wanted.get(id).copied()
    }

    /// Record the desired state of `id`.
    pub fn set(&mut self, id: &str, enabled: bool) {
        self.wanted.insert(id.to_string(), enabled);
    }

    /// `Features preferences: [✓]content, [ ]analytics, ...` summary of the
    /// non-mandatory features in registry order.
    #[must_use]
    pub fn summary(&self, registry: &FeatureRegistry) -> String {
        let items: Vec<String> = registry
            .iter()
            .filter(|f| !f.mandatory())
            .map(|f| {
                let mark = if self.is_enabled(f.id()) { '✓' } else { ' ' };
                format!("[{mark}]{}", f.id())
            })
            .collect();
        format!("Features preferences: {}", items.join(", "))
    }
}

/// On-disk order of the document: registry order, optional features only.
struct Document(Vec<(&'static str, bool)>);

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (*k, *v)))
    }
}

/// Loads and saves [`FeaturePreferences`] at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    /// Store keeping its document in `state_dir`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(FILE_NAME),
        }
    }

    /// Location of the preference document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored preferences.
    ///
    /// Never fails: a missing file yields the defaults, and a file that
    /// cannot be read or parsed is logged and also yields the defaults.
    /// Entries for unknown or mandatory features are ignored.
    #[must_use]
    pub fn load(&self, registry: &FeatureRegistry) -> FeaturePreferences {
        let mut prefs = FeaturePreferences::default();
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return prefs,
            Err(e) => {
                tracing::warn!("cannot read {}: {e}", self.path.display());
                return prefs;
            }
        };
        let entries: BTreeMap<String, Option<bool>> = match serde_json::from_str(&text) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("ignoring malformed {}: {e}", self.path.display());
                return prefs;
            }
        };
        for (id, value) in entries {
            match registry.get(&id) {
                None => tracing::warn!("ignoring preference for unknown feature '{id}'"),
                Some(f) if f.mandatory() => {}
                Some(f) => {
                    if let Some(enabled) = value {
                        prefs.set(f.id(), enabled);
                    }
                }
            }
        }
        prefs
    }

    /// Atomically write `prefs`, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(
        &self,
        prefs: &FeaturePreferences,
        registry: &FeatureRegistry,
    ) -> Result<(), PersistenceError> {
        let doc = Document(
            registry
                .iter()
                .filter(|f| !f.mandatory())
                .map(|f| (f.id(), prefs.is_enabled(f.id())))
                .collect(),
        );
        let mut json = to_pretty_json(&doc)?;
        json.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(PersistenceError::at(parent))?;
        }
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(PersistenceError::at(&temp))?;
        std::fs::rename(&temp, &self.path).map_err(PersistenceError::at(&self.path))?;
        tracing::debug!("saved feature preferences to {}", self.path.display());
        Ok(())
    }

    /// Delete the document. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<(), PersistenceError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
