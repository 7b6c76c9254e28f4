//! # Tracked State
//!
//! Lifecycle phase of one managed resource instance and its on-disk persistence.
//!
//! A resource starts [`Phase::Desired`] with no identifier. Create moves it to
//! [`Phase::Managed`]; reads and updates keep it there. Delete, or a read that the
//! backend answers with an explicit not-found, moves it to [`Phase::Absent`] and
//! discards the tracked record together with its identifier.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::error::Warning;
use crate::model::ResourceKind;
use crate::reconciler::{Applied, ReadOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Desired,
    Managed,
    Absent,
}

/// One resource instance as tracked between lifecycle calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedResource<S> {
    pub kind: ResourceKind,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<S>,
}

impl<S> TrackedResource<S> {
    #[must_use]
    pub fn desired(kind: ResourceKind) -> Self {
        Self {
            kind,
            phase: Phase::Desired,
            record: None,
        }
    }

    /// Track the result of a successful create or update, returning its warnings
    pub fn apply(&mut self, applied: Applied<S>) -> Vec<Warning> {
        self.phase = Phase::Managed;
        self.record = Some(applied.state);
        applied.warnings
    }

    /// Fold a read outcome into the tracked record, returning any warnings
    pub fn apply_read(&mut self, outcome: ReadOutcome<S>) -> Vec<Warning> {
        match outcome {
            ReadOutcome::Refreshed(applied) => self.apply(applied),
            ReadOutcome::Preserved(warning) => vec![warning],
            ReadOutcome::Removed => {
                self.mark_absent();
                Vec::new()
            }
        }
    }

    pub fn mark_absent(&mut self) {
        self.phase = Phase::Absent;
        self.record = None;
    }

    /// The tracked record, if the resource is currently managed
    #[must_use]
    pub fn managed(&self) -> Option<&S> {
        match self.phase {
            Phase::Managed => self.record.as_ref(),
            Phase::Desired | Phase::Absent => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("could not access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is not valid: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file {path} tracks a {found}, not a {expected}")]
    KindMismatch {
        path: PathBuf,
        expected: ResourceKind,
        found: ResourceKind,
    },
}

/// JSON file holding one [`TrackedResource`]
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the tracked resource, or a fresh [`Phase::Desired`] one when no file exists
    ///
    /// # Errors
    /// I/O failures, malformed JSON, or a file that tracks a different kind
    pub fn load<S: DeserializeOwned>(
        &self,
        kind: ResourceKind,
    ) -> Result<TrackedResource<S>, StateError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file, starting from desired");
                return Ok(TrackedResource::desired(kind));
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let tracked: TrackedResource<S> =
            serde_json::from_slice(&raw).map_err(|source| StateError::Format {
                path: self.path.clone(),
                source,
            })?;
        if tracked.kind != kind {
            return Err(StateError::KindMismatch {
                path: self.path.clone(),
                expected: kind,
                found: tracked.kind,
            });
        }
        Ok(tracked)
    }

    /// Persist the tracked resource; an absent resource removes the file instead
    ///
    /// # Errors
    /// I/O or encoding failures
    pub fn save<S: Serialize>(&self, tracked: &TrackedResource<S>) -> Result<(), StateError> {
        if tracked.phase == Phase::Absent {
            return self.remove();
        }
        let json = serde_json::to_vec_pretty(tracked).map_err(|source| StateError::Format {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), phase = ?tracked.phase, "saved state file");
        Ok(())
    }

    /// Delete the file; a missing file is not an error
    ///
    /// # Errors
    /// I/O failures other than not-found
    pub fn remove(&self) -> Result<(), StateError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupState;
    use std::collections::BTreeSet;

    fn group(name: &str) -> GroupState {
        GroupState {
            id: "g1".to_string(),
            project_id: "p1".to_string(),
            name: name.to_string(),
            description: String::new(),
            permissions: BTreeSet::from(["read".to_string()]),
        }
    }

    fn managed(name: &str) -> TrackedResource<GroupState> {
        let mut tracked = TrackedResource::desired(ResourceKind::Group);
        tracked.apply(Applied {
            state: group(name),
            warnings: Vec::new(),
        });
        tracked
    }

    #[test]
    fn test_preserved_read_leaves_record_unchanged() {
        let mut tracked = managed("Admins");
        let warnings = tracked.apply_read(ReadOutcome::Preserved(Warning::new(
            "group fetch failed with status 503",
            "status=503 body=",
        )));
        assert_eq!(warnings.len(), 1);
        assert_eq!(tracked.phase, Phase::Managed);
        assert_eq!(tracked.managed(), Some(&group("Admins")));
    }

    #[test]
    fn test_refreshed_read_replaces_record() {
        let mut tracked = managed("Admins");
        tracked.apply_read(ReadOutcome::Refreshed(Applied {
            state: group("Operators"),
            warnings: Vec::new(),
        }));
        assert_eq!(tracked.managed().map(|g| g.name.as_str()), Some("Operators"));
    }

    #[test]
    fn test_removed_read_discards_identifier() {
        let mut tracked = managed("Admins");
        tracked.apply_read(ReadOutcome::Removed);
        assert_eq!(tracked.phase, Phase::Absent);
        assert!(tracked.record.is_none());
        assert!(tracked.managed().is_none());
    }

    #[test]
    fn test_state_file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("group.json"));

        let fresh: TrackedResource<GroupState> = file.load(ResourceKind::Group).unwrap();
        assert_eq!(fresh.phase, Phase::Desired);

        file.save(&managed("Admins")).unwrap();
        let loaded: TrackedResource<GroupState> = file.load(ResourceKind::Group).unwrap();
        assert_eq!(loaded, managed("Admins"));
    }

    #[test]
    fn test_state_file_rejects_other_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("group.json"));
        file.save(&managed("Admins")).unwrap();

        let err = file
            .load::<GroupState>(ResourceKind::Environment)
            .unwrap_err();
        assert!(matches!(err, StateError::KindMismatch { .. }));
    }

    #[test]
    fn test_saving_absent_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("group.json"));
        let mut tracked = managed("Admins");
        file.save(&tracked).unwrap();
        assert!(file.path().exists());

        tracked.mark_absent();
        file.save(&tracked).unwrap();
        assert!(!file.path().exists());
        file.remove().unwrap();
    }

    #[test]
    fn test_malformed_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = StateFile::new(&path)
            .load::<GroupState>(ResourceKind::Group)
            .unwrap_err();
        assert!(matches!(err, StateError::Format { .. }));
    }
}
