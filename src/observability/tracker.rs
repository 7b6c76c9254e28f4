//! Operation tracking shared by every reconciler.

use std::time::{Duration, Instant};
use tracing::Span;

use super::metrics;
use crate::error::EngineError;
use crate::model::ResourceKind;

/// Tracks one lifecycle operation: records span attributes and metrics on completion
///
/// The span must declare `operation.success`, `operation.duration_ms` and
/// `error.message` (as `tracing::field::Empty`) for the attributes to be kept.
#[derive(Debug)]
pub struct OperationTracker {
    start: Instant,
    span: Span,
    kind: ResourceKind,
    operation: &'static str,
}

impl OperationTracker {
    #[must_use]
    pub fn new(span: Span, kind: ResourceKind, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            span,
            kind,
            operation,
        }
    }

    pub fn record_success(&self) {
        let duration = self.start.elapsed();
        self.record_common(duration);
        self.span.record("operation.success", true);
    }

    pub fn record_error(&self, error: &EngineError) {
        let duration = self.start.elapsed();
        self.record_common(duration);
        self.span.record("operation.success", false);
        self.span.record("error.message", error.to_string());
        metrics::increment_backend_request_errors(self.kind.as_str(), self.operation);
    }

    /// Record the outcome of `result` and hand it back unchanged
    pub fn finish<T>(&self, result: Result<T, EngineError>) -> Result<T, EngineError> {
        match &result {
            Ok(_) => self.record_success(),
            Err(e) => self.record_error(e),
        }
        result
    }

    fn record_common(&self, duration: Duration) {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Operation durations never approach u64::MAX milliseconds"
        )]
        let millis = duration.as_millis() as u64;
        self.span.record("operation.duration_ms", millis);
        metrics::record_backend_request(
            self.kind.as_str(),
            self.operation,
            duration.as_secs_f64(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::field::Empty;

    #[test]
    fn test_finish_passes_result_through() {
        let span = tracing::info_span!(
            "brms.test.op",
            operation.success = Empty,
            operation.duration_ms = Empty,
            error.message = Empty
        );
        let tracker = OperationTracker::new(span, ResourceKind::Group, "read");
        assert_eq!(tracker.finish(Ok::<_, EngineError>(7)).unwrap(), 7);

        let err = tracker
            .finish::<()>(Err(EngineError::MissingIdentifier {
                kind: ResourceKind::Group,
            }))
            .unwrap_err();
        assert_eq!(err.label(), "missing_identifier");
    }
}
