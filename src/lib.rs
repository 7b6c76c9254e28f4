//! BRMS Reconciler Library
//!
//! Converges projects, environments and groups held by a BRMS REST backend to a
//! declared configuration.
//!
//! The [`Engine`] owns the shared collaborators (transport, pagination, retry policy)
//! and hands out one [`Reconciler`] per resource kind. Tests are included in the
//! module files and under `tests/`.

pub mod backoff;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod model;
pub mod normalize;
pub mod observability;
pub mod pagination;
pub mod paths;
pub mod reconciler;
pub mod resolver;
pub mod schema;
pub mod state;

pub use client::{ApiRequest, ApiResponse, HttpTransport, Transport};
pub use config::{EngineConfig, ReferenceMode};
pub use error::{ConfigError, EngineError, ParseError, Result, Warning};
pub use reconciler::{
    Applied, Engine, EnvironmentReconciler, GroupReconciler, ProjectReconciler, ReadOutcome,
    Reconciler,
};
pub use state::{Phase, StateFile, TrackedResource};
