//! Group: a named permission set within a project, referenced by environments.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use super::{canonical_set, prefer_server, ResourceKind};
use crate::error::{EngineError, Result};
use crate::normalize::WireRecord;

/// Desired group configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    /// Identifier of the owning project (immutable after creation)
    pub project_id: String,
    pub name: String,
    /// Free-form description; empty when unset
    #[serde(default)]
    pub description: Option<String>,
    /// Permission strings; order and duplicates are irrelevant
    pub permissions: Vec<String>,
}

impl GroupSpec {
    /// # Errors
    /// Returns [`EngineError::Validation`] for an empty name, parent or permission set
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(EngineError::validation(
                ResourceKind::Group,
                "project_id must not be empty",
            ));
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::validation(
                ResourceKind::Group,
                "name must not be empty",
            ));
        }
        if self.permission_set().is_empty() {
            return Err(EngineError::validation(
                ResourceKind::Group,
                "permissions must contain at least one entry",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn permission_set(&self) -> BTreeSet<String> {
        canonical_set(&self.permissions)
    }

    /// Body shared by create and full-replace update
    #[must_use]
    pub fn body(&self) -> GroupBody {
        GroupBody {
            name: self.name.clone(),
            description: self.description.clone(),
            permissions: self.permission_set().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

/// Canonical group as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_permissions")]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub role_id: Option<String>,
}

fn deserialize_permissions<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let permissions: Vec<String> = super::null_as_default(deserializer)?;
    Ok(canonical_set(permissions))
}

impl WireRecord for GroupRecord {
    const KIND: ResourceKind = ResourceKind::Group;

    fn identifier(&self) -> &str {
        &self.id
    }

    fn set_identifier(&mut self, id: String) {
        self.id = id;
    }

    fn is_recognisable(&self) -> bool {
        !self.id.is_empty() || !self.name.is_empty()
    }
}

/// Tracked state of a managed group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub permissions: BTreeSet<String>,
}

impl GroupState {
    /// State after a create or update
    ///
    /// Description falls back to the desired value, then to the empty string.
    /// Permissions come from the server; an omitted list keeps the desired set.
    #[must_use]
    pub fn from_record(record: &GroupRecord, desired: &GroupSpec) -> Self {
        let permissions = if record.permissions.is_empty() {
            desired.permission_set()
        } else {
            record.permissions.clone()
        };
        Self {
            id: record.id.clone(),
            project_id: desired.project_id.clone(),
            name: prefer_server(&record.name, &desired.name),
            description: record
                .description
                .clone()
                .or_else(|| desired.description.clone())
                .unwrap_or_default(),
            permissions,
        }
    }

    /// Fold a freshly read record into the tracked state
    #[must_use]
    pub fn refreshed(&self, record: &GroupRecord) -> Self {
        Self {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            name: prefer_server(&record.name, &self.name),
            description: record.description.clone().unwrap_or_default(),
            permissions: record.permissions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(perms: &[&str]) -> GroupSpec {
        GroupSpec {
            project_id: "p1".to_string(),
            name: "Admins".to_string(),
            description: None,
            permissions: perms.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    #[test]
    fn test_body_sorts_and_dedups_permissions() {
        let body = spec(&["write", "read", "write"]).body();
        assert_eq!(body.permissions, vec!["read", "write"]);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_validate_rejects_empty_permissions() {
        assert!(matches!(
            spec(&[]).validate(),
            Err(EngineError::Validation { .. })
        ));
        assert!(matches!(
            spec(&["", ""]).validate(),
            Err(EngineError::Validation { .. })
        ));
        assert!(spec(&["read"]).validate().is_ok());
    }

    #[test]
    fn test_record_null_fields_normalize_to_defaults() {
        let record: GroupRecord = serde_json::from_value(serde_json::json!({
            "id": "g1",
            "name": "Admins",
            "description": null,
            "permissions": null
        }))
        .unwrap();
        assert!(record.permissions.is_empty());
        assert_eq!(record.description, None);

        let state = GroupState {
            id: "g1".to_string(),
            project_id: "p1".to_string(),
            name: "Admins".to_string(),
            description: "old".to_string(),
            permissions: canonical_set(["read"]),
        }
        .refreshed(&record);
        assert_eq!(state.description, "");
        assert!(state.permissions.is_empty());
    }

    #[test]
    fn test_record_permissions_drop_blank_entries() {
        let record: GroupRecord = serde_json::from_value(serde_json::json!({
            "id": "g1",
            "permissions": ["write", "", "read", "write"]
        }))
        .unwrap();
        assert_eq!(record.permissions, canonical_set(["read", "write"]));
    }

    #[test]
    fn test_from_record_description_fallbacks() {
        let mut desired = spec(&["read"]);
        desired.description = Some("ops team".to_string());
        let record = GroupRecord {
            id: "g1".to_string(),
            ..GroupRecord::default()
        };
        let state = GroupState::from_record(&record, &desired);
        assert_eq!(state.description, "ops team");
        assert_eq!(state.name, "Admins");
        assert_eq!(state.permissions, canonical_set(["read"]));

        desired.description = None;
        assert_eq!(GroupState::from_record(&record, &desired).description, "");
    }
}
