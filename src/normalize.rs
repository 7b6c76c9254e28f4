//! # Response Normalizer
//!
//! Turns raw backend bodies into canonical records without knowing in advance which
//! encoding the backend chose.
//!
//! Single records are tried against an ordered list of shapes:
//! 1. envelope: `{"<kind>": {...}}`
//! 2. flat object
//!
//! Listings are tried against:
//! 1. bare array: `[{...}, ...]`
//! 2. paginated envelope: `{"results": [...], "paginate": {...}}`
//! 3. collection envelope: `{"<kinds>": [...]}`
//!
//! Each shape detector is a pure function from a parsed JSON value to an optional
//! result. The first detector that succeeds wins; when none does, a [`ParseError`] is
//! returned. Field-level tolerance (nulls, missing optionals, polymorphic approval
//! groups) lives in the record types themselves.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::model::{null_as_default, ResourceKind};

/// A canonical record type the normalizer can produce
pub trait WireRecord: DeserializeOwned + Default + Send {
    const KIND: ResourceKind;

    /// Backend-assigned identifier; empty when the backend omitted it
    fn identifier(&self) -> &str;

    fn set_identifier(&mut self, id: String);

    /// Whether the parsed object carries at least one identifying field
    ///
    /// Every field of a record is optional, so any JSON object deserializes into
    /// something. This guards against accepting an unrelated object as a record.
    fn is_recognisable(&self) -> bool;
}

/// Pagination metadata reported alongside a page of results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginate {
    #[serde(default, deserialize_with = "null_as_default")]
    pub page_size: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
    /// `null` on an empty page
    #[serde(default, deserialize_with = "null_as_default")]
    pub from: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub to: u64,
}

/// One normalized page of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<R> {
    pub items: Vec<R>,
    /// `None` when the backend sent no pagination metadata (the page is the whole collection)
    pub paginate: Option<Paginate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    Envelope,
    Flat,
}

impl RecordShape {
    pub const ORDER: [RecordShape; 2] = [RecordShape::Envelope, RecordShape::Flat];

    #[must_use]
    pub fn detect<R: WireRecord>(self, value: &Value) -> Option<R> {
        let candidate = match self {
            RecordShape::Envelope => value.get(R::KIND.envelope_key())?,
            RecordShape::Flat => value,
        };
        if !candidate.is_object() {
            return None;
        }
        R::deserialize(candidate)
            .ok()
            .filter(R::is_recognisable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListShape {
    BareArray,
    Paginated,
    CollectionEnvelope,
}

impl ListShape {
    pub const ORDER: [ListShape; 3] = [
        ListShape::BareArray,
        ListShape::Paginated,
        ListShape::CollectionEnvelope,
    ];

    #[must_use]
    pub fn detect<R: WireRecord>(self, value: &Value) -> Option<Page<R>> {
        match self {
            ListShape::BareArray => {
                let items = items_of::<R>(value)?;
                Some(Page {
                    items,
                    paginate: None,
                })
            }
            ListShape::Paginated => {
                let items = items_of::<R>(value.get("results")?)?;
                let paginate = match value.get("paginate") {
                    None | Some(Value::Null) => None,
                    Some(meta) => Some(Paginate::deserialize(meta).ok()?),
                };
                Some(Page { items, paginate })
            }
            ListShape::CollectionEnvelope => {
                let items = items_of::<R>(value.get(R::KIND.collection_key())?)?;
                Some(Page {
                    items,
                    paginate: None,
                })
            }
        }
    }
}

fn items_of<R: WireRecord>(value: &Value) -> Option<Vec<R>> {
    if !value.is_array() {
        return None;
    }
    Vec::<R>::deserialize(value).ok()
}

fn parse_value(kind: ResourceKind, raw: &[u8]) -> Result<Value, ParseError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::new(kind, "empty body"));
    }
    serde_json::from_slice(raw).map_err(|e| ParseError::new(kind, format!("invalid JSON: {e}")))
}

/// Normalize a single-record response
///
/// # Errors
/// Returns [`ParseError`] when the body matches no known single-record shape
pub fn normalize_record<R: WireRecord>(raw: &[u8]) -> Result<R, ParseError> {
    let value = parse_value(R::KIND, raw)?;
    RecordShape::ORDER
        .iter()
        .find_map(|shape| shape.detect::<R>(&value))
        .ok_or_else(|| ParseError::new(R::KIND, "body matches no known record shape"))
}

/// Normalize one page of a listing response
///
/// # Errors
/// Returns [`ParseError`] when the body matches no known listing shape
pub fn normalize_page<R: WireRecord>(raw: &[u8]) -> Result<Page<R>, ParseError> {
    let value = parse_value(R::KIND, raw)?;
    ListShape::ORDER
        .iter()
        .find_map(|shape| shape.detect::<R>(&value))
        .ok_or_else(|| ParseError::new(R::KIND, "body matches no known listing shape"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{canonical_set, EnvironmentRecord, GroupRecord, ProjectRecord};
    use serde_json::json;

    fn bytes(value: &Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn test_flat_and_envelope_project_agree() {
        let flat = json!({"id": "p1", "name": "Pricing", "key": "pricing", "protected": true});
        let wrapped = json!({"project": flat.clone()});
        let a: ProjectRecord = normalize_record(&bytes(&flat)).unwrap();
        let b: ProjectRecord = normalize_record(&bytes(&wrapped)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.protected, Some(true));
    }

    #[test]
    fn test_unrecognisable_object_is_a_parse_error() {
        let err = normalize_record::<ProjectRecord>(&bytes(&json!({"status": "ok"}))).unwrap_err();
        assert_eq!(err.kind, ResourceKind::Project);

        let err = normalize_record::<ProjectRecord>(b"   ").unwrap_err();
        assert_eq!(err.reason, "empty body");

        assert!(normalize_record::<ProjectRecord>(b"<html>").is_err());
        assert!(normalize_record::<ProjectRecord>(&bytes(&json!([1, 2]))).is_err());
    }

    #[test]
    fn test_paginated_listing_with_null_permissions() {
        let raw = json!({
            "results": [{"id": "g1", "name": "Admins", "permissions": null}],
            "paginate": {"pageSize": 1, "current": 1, "total": 1, "from": 1, "to": 1}
        });
        let page: Page<GroupRecord> = normalize_page(&bytes(&raw)).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Admins");
        assert!(page.items[0].permissions.is_empty());
        let meta = page.paginate.unwrap();
        assert_eq!((meta.page_size, meta.total), (1, 1));
    }

    #[test]
    fn test_null_paginate_fields_default_to_zero() {
        let empty = json!({
            "results": [],
            "paginate": {"pageSize": 200, "current": 1, "total": 0, "from": null, "to": null}
        });
        let page: Page<GroupRecord> = normalize_page(&bytes(&empty)).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(
            page.paginate,
            Some(Paginate {
                page_size: 200,
                current: 1,
                total: 0,
                from: 0,
                to: 0
            })
        );

        let partial = json!({
            "results": [{"id": "g1", "name": "Admins"}],
            "paginate": {"pageSize": null, "current": 1, "total": 1, "from": 1, "to": null}
        });
        let page: Page<GroupRecord> = normalize_page(&bytes(&partial)).unwrap();
        assert_eq!(page.items[0].id, "g1");
        assert_eq!(page.paginate.map(|p| (p.page_size, p.to)), Some((0, 0)));
    }

    #[test]
    fn test_bare_array_listing() {
        let raw = json!([
            {"id": "e1", "name": "dev", "key": "dev", "type": "brms", "approvalGroups": ["g2", "g1"]},
            {"id": "e2", "name": "prod", "key": "prod", "type": "deployment",
             "approvalGroups": [{"id": "g1", "name": "Admins"}]}
        ]);
        let page: Page<EnvironmentRecord> = normalize_page(&bytes(&raw)).unwrap();
        assert!(page.paginate.is_none());
        assert_eq!(page.items[0].approval_group_ids, canonical_set(["g1", "g2"]));
        assert_eq!(page.items[1].approval_group_ids, canonical_set(["g1"]));
    }

    #[test]
    fn test_collection_envelope_listing() {
        let raw = json!({"groups": [{"id": "g1", "name": "Admins", "permissions": ["b", "a", "a"]}]});
        let page: Page<GroupRecord> = normalize_page(&bytes(&raw)).unwrap();
        assert_eq!(page.items[0].permissions, canonical_set(["a", "b"]));
    }

    #[test]
    fn test_listing_without_paginate_metadata() {
        let raw = json!({"results": []});
        let page: Page<GroupRecord> = normalize_page(&bytes(&raw)).unwrap();
        assert!(page.items.is_empty());
        assert!(page.paginate.is_none());
    }

    #[test]
    fn test_unknown_listing_shape_is_a_parse_error() {
        let err = normalize_page::<GroupRecord>(&bytes(&json!({"data": []}))).unwrap_err();
        assert_eq!(err.kind, ResourceKind::Group);
    }

    #[test]
    fn test_shape_detectors_are_independent() {
        let flat = json!({"id": "g1", "name": "Admins"});
        assert!(RecordShape::Envelope.detect::<GroupRecord>(&flat).is_none());
        assert!(RecordShape::Flat.detect::<GroupRecord>(&flat).is_some());
        assert!(ListShape::Paginated.detect::<GroupRecord>(&json!([])).is_none());
        assert!(ListShape::BareArray.detect::<GroupRecord>(&json!([])).is_some());
    }
}
