//! Project: the root of the resource hierarchy.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::{non_empty, prefer_server, ResourceKind};
use crate::constants::PROJECT_KEY_PATTERN;
use crate::error::{EngineError, Result};
use crate::normalize::WireRecord;

static PROJECT_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(PROJECT_KEY_PATTERN).expect("project key pattern is a valid regex")
});

/// Desired project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProjectSpec {
    /// Display name
    pub name: String,
    /// Unique slug, lowercase alphanumerics separated by single dashes
    pub key: String,
    /// Protection flag; treated as `false` when unset
    #[serde(default)]
    pub protected: Option<bool>,
    /// Identifier of a template project to clone content from. Only used on create.
    #[serde(default)]
    pub copy_content_ref: Option<String>,
}

impl ProjectSpec {
    /// # Errors
    /// Returns [`EngineError::Validation`] when the name is empty or the key is malformed
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::validation(
                ResourceKind::Project,
                "name must not be empty",
            ));
        }
        if !PROJECT_KEY_RE.is_match(&self.key) {
            return Err(EngineError::validation(
                ResourceKind::Project,
                format!("key {:?} must match {PROJECT_KEY_PATTERN}", self.key),
            ));
        }
        Ok(())
    }

    /// Body for `POST /api/projects`
    #[must_use]
    pub fn create_body(&self) -> ProjectBody {
        ProjectBody {
            name: self.name.clone(),
            key: self.key.clone(),
            protected: self.protected,
            copy_content_ref: non_empty(self.copy_content_ref.as_deref()),
        }
    }

    /// Full-replace body for `PUT /api/projects/{id}`
    ///
    /// `protected` is always sent: desired value, else the tracked value, else `false`.
    /// `copy_content_ref` is write-once and never sent.
    #[must_use]
    pub fn update_body(&self, prior: Option<&ProjectState>) -> ProjectBody {
        let protected = self
            .protected
            .or_else(|| prior.map(|p| p.protected))
            .unwrap_or(false);
        ProjectBody {
            name: self.name.clone(),
            key: self.key.clone(),
            protected: Some(protected),
            copy_content_ref: None,
        }
    }
}

/// Request payload for create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBody {
    pub name: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy_content_ref: Option<String>,
}

/// Canonical project as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub key: String,
    #[serde(default)]
    pub protected: Option<bool>,
}

impl WireRecord for ProjectRecord {
    const KIND: ResourceKind = ResourceKind::Project;

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

/// Tracked state of a managed project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    pub id: String,
    pub name: String,
    pub key: String,
    pub protected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_content_ref: Option<String>,
}

impl ProjectState {
    /// State after a create or update, the server winning wherever it returned a value
    #[must_use]
    pub fn from_record(record: &ProjectRecord, desired: &ProjectSpec, sent: &ProjectBody) -> Self {
        Self {
            id: record.id.clone(),
            name: prefer_server(&record.name, &desired.name),
            key: prefer_server(&record.key, &desired.key),
            protected: record.protected.or(sent.protected).unwrap_or(false),
            copy_content_ref: non_empty(desired.copy_content_ref.as_deref()),
        }
    }

    /// Fold a freshly read record into the tracked state
    #[must_use]
    pub fn refreshed(&self, record: &ProjectRecord) -> Self {
        Self {
            id: self.id.clone(),
            name: prefer_server(&record.name, &self.name),
            key: prefer_server(&record.key, &self.key),
            protected: record.protected.unwrap_or(self.protected),
            copy_content_ref: self.copy_content_ref.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(key: &str) -> ProjectSpec {
        ProjectSpec {
            name: "Pricing".to_string(),
            key: key.to_string(),
            protected: None,
            copy_content_ref: None,
        }
    }

    #[test]
    fn test_project_key_validation() {
        for ok in ["ab", "pricing", "pricing-v2", "a1-b2-c3"] {
            assert!(spec(ok).validate().is_ok(), "{ok} should be accepted");
        }
        for bad in ["a", "Pricing", "pricing-", "-pricing", "pri--cing", "pri_cing", ""] {
            assert!(
                matches!(spec(bad).validate(), Err(EngineError::Validation { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_create_body_omits_unset_optionals() {
        let body = serde_json::to_value(spec("pricing").create_body()).unwrap();
        assert_eq!(body, serde_json::json!({"name": "Pricing", "key": "pricing"}));
    }

    #[test]
    fn test_create_body_carries_copy_content_ref() {
        let mut s = spec("pricing");
        s.copy_content_ref = Some("tpl-1".to_string());
        s.protected = Some(true);
        let body = serde_json::to_value(s.create_body()).unwrap();
        assert_eq!(body["copyContentRef"], "tpl-1");
        assert_eq!(body["protected"], true);
    }

    #[test]
    fn test_update_body_protected_fallbacks() {
        let mut s = spec("pricing");
        s.copy_content_ref = Some("tpl-1".to_string());
        assert_eq!(s.update_body(None).protected, Some(false));

        let prior = ProjectState {
            id: "p1".to_string(),
            name: "Pricing".to_string(),
            key: "pricing".to_string(),
            protected: true,
            copy_content_ref: None,
        };
        let body = s.update_body(Some(&prior));
        assert_eq!(body.protected, Some(true));
        assert_eq!(body.copy_content_ref, None);

        s.protected = Some(false);
        assert_eq!(s.update_body(Some(&prior)).protected, Some(false));
    }

    #[test]
    fn test_refreshed_keeps_prior_values_for_missing_fields() {
        let prior = ProjectState {
            id: "p1".to_string(),
            name: "Pricing".to_string(),
            key: "pricing".to_string(),
            protected: true,
            copy_content_ref: Some("tpl".to_string()),
        };
        let record = ProjectRecord {
            id: "p1".to_string(),
            name: "Pricing Rules".to_string(),
            ..ProjectRecord::default()
        };
        let next = prior.refreshed(&record);
        assert_eq!(next.name, "Pricing Rules");
        assert_eq!(next.key, "pricing");
        assert!(next.protected);
        assert_eq!(next.copy_content_ref.as_deref(), Some("tpl"));
    }
}
