//! # Metrics
//!
//! Prometheus metrics for monitoring the reconciliation engine.
//!
//! ## Metrics Exposed
//!
//! - `brms_backend_requests_total` - Lifecycle operations issued, by kind and operation
//! - `brms_backend_request_errors_total` - Lifecycle operations that failed, by kind and operation
//! - `brms_backend_request_duration_seconds` - Duration of lifecycle operations
//! - `brms_read_preserved_total` - Reads that kept the last known record instead of refreshing
//! - `brms_delete_retries_total` - Delete attempts beyond the first
//! - `brms_references_dropped_total` - Group names dropped because they did not resolve

use anyhow::Result;
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static BACKEND_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "brms_backend_requests_total",
            "Total number of lifecycle operations against the BRMS backend",
        ),
        &["kind", "operation"],
    )
    .expect("Failed to create BACKEND_REQUESTS_TOTAL metric - this should never happen")
});

static BACKEND_REQUEST_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "brms_backend_request_errors_total",
            "Total number of failed lifecycle operations against the BRMS backend",
        ),
        &["kind", "operation"],
    )
    .expect("Failed to create BACKEND_REQUEST_ERRORS_TOTAL metric - this should never happen")
});

static BACKEND_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "brms_backend_request_duration_seconds",
            "Duration of lifecycle operations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind", "operation"],
    )
    .expect("Failed to create BACKEND_REQUEST_DURATION metric - this should never happen")
});

static READ_PRESERVED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "brms_read_preserved_total",
            "Total number of reads that preserved the last known record",
        ),
        &["kind"],
    )
    .expect("Failed to create READ_PRESERVED_TOTAL metric - this should never happen")
});

static DELETE_RETRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "brms_delete_retries_total",
            "Total number of delete attempts after the first",
        ),
        &["kind"],
    )
    .expect("Failed to create DELETE_RETRIES_TOTAL metric - this should never happen")
});

static REFERENCES_DROPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "brms_references_dropped_total",
        "Total number of group references dropped because the name did not resolve",
    )
    .expect("Failed to create REFERENCES_DROPPED_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
/// Register all engine metrics with the registry
///
/// Fails if called twice, since the registry rejects duplicate collectors.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(BACKEND_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKEND_REQUEST_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKEND_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(READ_PRESERVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DELETE_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REFERENCES_DROPPED_TOTAL.clone()))?;
    Ok(())
}

/// Render every registered metric in the Prometheus text exposition format
///
/// # Errors
/// Returns an error if encoding fails
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_backend_request(kind: &str, operation: &str, duration: f64) {
    BACKEND_REQUESTS_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
    BACKEND_REQUEST_DURATION
        .with_label_values(&[kind, operation])
        .observe(duration);
}

pub fn increment_backend_request_errors(kind: &str, operation: &str) {
    BACKEND_REQUEST_ERRORS_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
}

pub fn increment_read_preserved(kind: &str) {
    READ_PRESERVED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_delete_retries(kind: &str) {
    DELETE_RETRIES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_references_dropped(count: usize) {
    REFERENCES_DROPPED_TOTAL.inc_by(count as u64);
}
