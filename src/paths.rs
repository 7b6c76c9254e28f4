//! API path definitions for the BRMS REST API.
//!
//! Centralizes every endpoint the reconcilers touch so collection and item paths
//! are built the same way everywhere. Identifiers are percent-encoded as single path
//! segments.

use urlencoding::{decode, encode};

const API_ROOT: &str = "/api";

#[must_use]
pub fn projects() -> String {
    format!("{API_ROOT}/projects")
}

#[must_use]
pub fn project(project_id: &str) -> String {
    format!("{API_ROOT}/projects/{}", encode(project_id))
}

#[must_use]
pub fn groups(project_id: &str) -> String {
    format!("{API_ROOT}/projects/{}/groups", encode(project_id))
}

#[must_use]
pub fn group(project_id: &str, group_id: &str) -> String {
    format!(
        "{API_ROOT}/projects/{}/groups/{}",
        encode(project_id),
        encode(group_id)
    )
}

#[must_use]
pub fn environments(project_id: &str) -> String {
    format!("{API_ROOT}/projects/{}/environments", encode(project_id))
}

#[must_use]
pub fn environment(project_id: &str, environment_id: &str) -> String {
    format!(
        "{API_ROOT}/projects/{}/environments/{}",
        encode(project_id),
        encode(environment_id)
    )
}

/// Last path segment of a `Location` header, used as a fallback identifier after create
#[must_use]
pub fn identifier_from_location(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(|segment| decode(segment).map_or_else(|_| segment.to_string(), |id| id.into_owned()))
}
