//! # Observability
//!
//! Metrics and tracing for the reconciliation engine.
//!
//! - `metrics`: Prometheus metrics collection
//! - `tracker`: per-operation span fields and metric recording

pub mod metrics;
pub mod tracker;

use tracing_subscriber::EnvFilter;

use crate::constants::DEFAULT_LOG_FILTER;

pub use tracker::OperationTracker;

/// Install the global `tracing` subscriber, honouring `RUST_LOG` when set
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
