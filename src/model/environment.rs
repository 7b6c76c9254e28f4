//! Environment: a deployment target within a project, gated by approval groups.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use super::{canonical_set, non_empty, prefer_server, ResourceKind};
use crate::error::{EngineError, Result};
use crate::normalize::WireRecord;

/// Desired environment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentSpec {
    /// Identifier of the owning project (immutable after creation)
    pub project_id: String,
    pub name: String,
    /// Defaults to `name` when unset or empty
    #[serde(default)]
    pub key: Option<String>,
    /// Environment type, passed to the backend verbatim
    #[serde(rename = "type")]
    pub env_type: String,
    /// Approval mode, passed to the backend verbatim
    #[serde(default)]
    pub approval_mode: Option<String>,
    /// Names of groups in the same project whose approval is required
    #[serde(default)]
    pub approval_groups: Vec<String>,
}

impl EnvironmentSpec {
    /// # Errors
    /// Returns [`EngineError::Validation`] for an empty name, parent or type
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(EngineError::validation(
                ResourceKind::Environment,
                "project_id must not be empty",
            ));
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::validation(
                ResourceKind::Environment,
                "name must not be empty",
            ));
        }
        if self.env_type.trim().is_empty() {
            return Err(EngineError::validation(
                ResourceKind::Environment,
                "type must not be empty",
            ));
        }
        Ok(())
    }

    /// The key sent to the backend: the declared key, or the name when none is declared
    #[must_use]
    pub fn effective_key(&self) -> String {
        non_empty(self.key.as_deref()).unwrap_or_else(|| self.name.clone())
    }

    #[must_use]
    pub fn approval_group_names(&self) -> BTreeSet<String> {
        canonical_set(&self.approval_groups)
    }

    /// Body shared by create and full-replace update; `group_ids` are already resolved
    #[must_use]
    pub fn body(&self, group_ids: &BTreeSet<String>) -> EnvironmentBody {
        EnvironmentBody {
            name: self.name.clone(),
            key: self.effective_key(),
            env_type: self.env_type.clone(),
            approval_mode: non_empty(self.approval_mode.as_deref()),
            approval_groups: group_ids.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentBody {
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub env_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_mode: Option<String>,
    /// Always sent so a full replace can clear the set
    pub approval_groups: Vec<String>,
}

/// Canonical environment as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRecord {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub key: String,
    #[serde(rename = "type", default, deserialize_with = "super::null_as_default")]
    pub env_type: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub project_id: String,
    #[serde(default)]
    pub approval_mode: Option<String>,
    /// Approval group identifiers, whichever shape the backend used
    #[serde(
        rename = "approvalGroups",
        default,
        deserialize_with = "deserialize_approval_groups"
    )]
    pub approval_group_ids: BTreeSet<String>,
}

impl WireRecord for EnvironmentRecord {
    const KIND: ResourceKind = ResourceKind::Environment;

    fn identifier(&self) -> &str {
        &self.id
    }

    fn set_identifier(&mut self, id: String) {
        self.id = id;
    }

    fn is_recognisable(&self) -> bool {
        !self.id.is_empty() || !self.name.is_empty() || !self.key.is_empty()
    }
}

#[derive(Deserialize)]
struct ApprovalGroupRef {
    id: String,
}

/// Approval groups arrive either as `["id", ...]` or as `[{"id": .., "name": ..}, ...]`
///
/// The string form is tried first, then the object form. Anything else yields an empty
/// set so one odd field never fails the rest of the record.
#[must_use]
pub fn approval_group_ids(value: &Value) -> BTreeSet<String> {
    if let Ok(ids) = Vec::<String>::deserialize(value) {
        return canonical_set(ids);
    }
    if let Ok(refs) = Vec::<ApprovalGroupRef>::deserialize(value) {
        return canonical_set(refs.into_iter().map(|r| r.id));
    }
    BTreeSet::new()
}

fn deserialize_approval_groups<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(approval_group_ids).unwrap_or_default())
}

/// Tracked state of a managed environment; approval groups are held by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub env_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_mode: Option<String>,
    #[serde(default)]
    pub approval_groups: BTreeSet<String>,
}

impl EnvironmentState {
    /// State after a create or update; `group_names` are the unresolved approval groups
    #[must_use]
    pub fn from_record(
        record: &EnvironmentRecord,
        desired: &EnvironmentSpec,
        group_names: BTreeSet<String>,
    ) -> Self {
        Self {
            id: record.id.clone(),
            project_id: desired.project_id.clone(),
            name: prefer_server(&record.name, &desired.name),
            key: prefer_server(&record.key, &desired.effective_key()),
            env_type: prefer_server(&record.env_type, &desired.env_type),
            approval_mode: record
                .approval_mode
                .clone()
                .or_else(|| non_empty(desired.approval_mode.as_deref())),
            approval_groups: group_names,
        }
    }

    /// Fold a freshly read record into the tracked state
    #[must_use]
    pub fn refreshed(&self, record: &EnvironmentRecord, group_names: BTreeSet<String>) -> Self {
        Self {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            name: record.name.clone(),
            key: record.key.clone(),
            env_type: record.env_type.clone(),
            approval_mode: record.approval_mode.clone(),
            approval_groups: group_names,
        }
    }
}
