//! Marker file recording that this host was connected.
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::PersistenceError;

/// File name of the marker inside the state directory.
pub const FILE_NAME: &str = "connected";

/// The marker's presence means the last connect registered the host and no
/// disconnect has removed it since. Its content is the RFC 3339 time of
/// that connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedMarker {
    path: PathBuf,
}

impl ConnectedMarker {
    /// Marker kept in `state_dir`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(FILE_NAME),
        }
    }

    /// Location of the marker.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` if the marker exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the marker stamped with `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory or the file cannot be written.
    pub fn write(&self, at: DateTime<Utc>) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(PersistenceError::at(parent))?;
        }
        let temp = self.path.with_extension("tmp");
        std::fs::write(&temp, format!("{}\n", at.to_rfc3339()))
            .map_err(PersistenceError::at(&temp))?;
        std::fs::rename(&temp, &self.path).map_err(PersistenceError::at(&self.path))?;
        tracing::debug!("wrote {}", self.path.display());
        Ok(())
    }

    /// Remove the marker. A missing marker is not an error.
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
