//! # Resource Model
//!
//! Types for the three managed resource kinds.
//!
//! Each kind has three shapes:
//! - a desired spec (what the user declares; group references by name)
//! - a canonical record (what the backend returned, normalized; references by identifier)
//! - a managed state (what is tracked after a successful lifecycle call; references by name)

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub mod environment;
pub mod group;
pub mod project;

pub use environment::{EnvironmentBody, EnvironmentRecord, EnvironmentSpec, EnvironmentState};
pub use group::{GroupBody, GroupRecord, GroupSpec, GroupState};
pub use project::{ProjectBody, ProjectRecord, ProjectSpec, ProjectState};

/// The kinds of resource the engine manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Project,
    Environment,
    Group,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Environment => "environment",
            ResourceKind::Group => "group",
        }
    }

    /// Wrapper key used when the backend nests a single record in an envelope
    #[must_use]
    pub fn envelope_key(&self) -> &'static str {
        self.as_str()
    }

    /// Wrapper key used when the backend nests a collection under the plural name
    #[must_use]
    pub fn collection_key(&self) -> &'static str {
        match self {
            ResourceKind::Project => "projects",
            ResourceKind::Environment => "environments",
            ResourceKind::Group => "groups",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse a multi-valued attribute into its canonical form: sorted, deduplicated, no blanks
pub fn canonical_set<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|v| {
            let v = v.as_ref();
            (!v.is_empty()).then(|| v.to_string())
        })
        .collect()
}

/// Treat an explicit JSON `null` the same as an absent field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Desired value when set and non-empty, otherwise `None`
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Server value when non-empty, otherwise the fallback
pub(crate) fn prefer_server(server: &str, fallback: &str) -> String {
    if server.is_empty() {
        fallback.to_string()
    } else {
        server.to_string()
    }
}
