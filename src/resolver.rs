//! # Reference Resolver
//!
//! Translates group names to backend identifiers and back, within one project.
//!
//! Every call re-lists the project's groups through the [`PaginationWalker`]; nothing
//! is cached between calls. An empty input short-circuits without a listing call.
//!
//! Names that do not exist in the listing are dropped in [`ReferenceMode::Lenient`]
//! and rejected with [`EngineError::UnresolvedReference`] in [`ReferenceMode::Strict`].
//! Identifiers that no longer exist are always dropped by [`ReferenceResolver::unresolve`].

use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::client::Transport;
use crate::config::ReferenceMode;
use crate::error::{EngineError, Result};
use crate::model::GroupRecord;
use crate::observability::metrics;
use crate::pagination::PaginationWalker;
use crate::paths;

/// Bidirectional name/identifier index of a project's groups
///
/// Built from one listing. Colliding names resolve to the last record listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupIndex {
    by_name: HashMap<String, String>,
    by_id: HashMap<String, String>,
}

impl GroupIndex {
    #[must_use]
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a GroupRecord>,
    {
        let mut index = Self::default();
        for record in records {
            if record.id.is_empty() || record.name.is_empty() {
                continue;
            }
            index.by_name.insert(record.name.clone(), record.id.clone());
            index.by_id.insert(record.id.clone(), record.name.clone());
        }
        index
    }

    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// Identifiers of the known names, plus the names that were not found
    #[must_use]
    pub fn resolve(&self, names: &BTreeSet<String>) -> (BTreeSet<String>, Vec<String>) {
        let mut ids = BTreeSet::new();
        let mut missing = Vec::new();
        for name in names {
            match self.id_of(name) {
                Some(id) => {
                    ids.insert(id.to_string());
                }
                None => missing.push(name.clone()),
            }
        }
        (ids, missing)
    }

    /// Names of the known identifiers; unknown identifiers are dropped
    #[must_use]
    pub fn unresolve(&self, ids: &BTreeSet<String>) -> BTreeSet<String> {
        ids.iter()
            .filter_map(|id| self.name_of(id))
            .map(str::to_string)
            .collect()
    }
}

/// Resolves group references against live backend state
#[derive(Clone, Copy)]
pub struct ReferenceResolver<'a> {
    transport: &'a dyn Transport,
    walker: PaginationWalker,
    mode: ReferenceMode,
}

impl std::fmt::Debug for ReferenceResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("walker", &self.walker)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<'a> ReferenceResolver<'a> {
    #[must_use]
    pub fn new(transport: &'a dyn Transport, walker: PaginationWalker, mode: ReferenceMode) -> Self {
        Self {
            transport,
            walker,
            mode,
        }
    }

    /// Fetch the current group index of a project
    ///
    /// # Errors
    /// Propagates listing failures from the [`PaginationWalker`]
    pub async fn index(&self, project_id: &str) -> Result<GroupIndex> {
        let groups: Vec<GroupRecord> = self
            .walker
            .list_all(self.transport, &paths::groups(project_id))
            .await?;
        Ok(GroupIndex::from_records(&groups))
    }

    /// Map group names to identifiers
    ///
    /// # Errors
    /// Listing failures, or [`EngineError::UnresolvedReference`] in strict mode
    pub async fn resolve(
        &self,
        names: &BTreeSet<String>,
        project_id: &str,
    ) -> Result<BTreeSet<String>> {
        if names.is_empty() {
            return Ok(BTreeSet::new());
        }
        let index = self.index(project_id).await?;
        let (ids, missing) = index.resolve(names);
        if !missing.is_empty() {
            match self.mode {
                ReferenceMode::Strict => {
                    return Err(EngineError::UnresolvedReference {
                        project_id: project_id.to_string(),
                        names: missing,
                    });
                }
                ReferenceMode::Lenient => {
                    debug!(project.id = project_id, dropped = ?missing, "dropping unresolved group names");
                    metrics::increment_references_dropped(missing.len());
                }
            }
        }
        Ok(ids)
    }

    /// Map group identifiers back to names, dropping identifiers that no longer exist
    ///
    /// # Errors
    /// Propagates listing failures from the [`PaginationWalker`]
    pub async fn unresolve(
        &self,
        ids: &BTreeSet<String>,
        project_id: &str,
    ) -> Result<BTreeSet<String>> {
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let index = self.index(project_id).await?;
        Ok(index.unresolve(ids))
    }
}
