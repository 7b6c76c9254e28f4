//! # Schema Description
//!
//! JSON Schema for the desired configuration of each resource kind, as a host would
//! publish it to describe the accepted fields.

use schemars::schema_for;
use serde_json::Value;

use crate::model::{EnvironmentSpec, GroupSpec, ProjectSpec, ResourceKind};

#[must_use]
pub fn schema_for(kind: ResourceKind) -> Value {
    let schema = match kind {
        ResourceKind::Project => schema_for!(ProjectSpec),
        ResourceKind::Environment => schema_for!(EnvironmentSpec),
        ResourceKind::Group => schema_for!(GroupSpec),
    };
    Value::from(schema)
}
