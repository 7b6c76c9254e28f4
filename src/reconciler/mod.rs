//! # Resource Reconcilers
//!
//! Create/Read/Update/Delete orchestration for each resource kind.
//!
//! ## Outcome policy
//!
//! - **Create / Update**: any failure is surfaced; nothing is applied partially.
//!   Redirects are never followed and never accepted.
//! - **Read**: an explicit not-found from an item endpoint means the resource is gone.
//!   Every other failure (5xx, other 4xx, redirect, unparseable body, connection
//!   error, absence from a listing) preserves the last known record with a warning.
//! - **Delete**: retried with a fixed delay; `404` and any `2xx` count as success.
//!
//! Each lifecycle call runs inside a `brms.<kind>.<operation>` span and is recorded
//! by an [`OperationTracker`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backoff::{Attempt, LastFailure, RetryPolicy};
use crate::client::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::config::{EngineConfig, ReferenceMode};
use crate::error::{EngineError, Result, Warning};
use crate::model::ResourceKind;
use crate::normalize::{normalize_record, WireRecord};
use crate::observability::metrics;
use crate::pagination::PaginationWalker;
use crate::paths;
use crate::resolver::ReferenceResolver;

#[cfg(doc)]
use crate::observability::OperationTracker;

/// Build a lifecycle span with the fields [`OperationTracker`] records into
macro_rules! operation_span {
    ($name:literal, $project:expr, $resource:expr) => {
        tracing::info_span!(
            $name,
            project.id = %$project,
            resource.id = %$resource,
            operation.success = tracing::field::Empty,
            operation.duration_ms = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    };
}
pub(crate) use operation_span;

pub mod environment;
pub mod group;
pub mod project;

pub use environment::EnvironmentReconciler;
pub use group::GroupReconciler;
pub use project::ProjectReconciler;

/// Result of a successful create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<S> {
    pub state: S,
    pub warnings: Vec<Warning>,
}

/// Result of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<S> {
    /// The backend confirmed the resource; tracked state should be replaced
    Refreshed(Applied<S>),
    /// The backend affirmatively reported not-found; tracked state should be dropped
    Removed,
    /// The backend could not corroborate the resource; keep the last known state
    Preserved(Warning),
}

/// Lifecycle operations for one resource kind
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Spec: Send + Sync;
    type State: Send + Sync;

    const KIND: ResourceKind;

    /// # Errors
    /// Validation, backend rejection, parse failure, missing identifier, or unresolved
    /// references in strict mode
    async fn create(&self, desired: &Self::Spec) -> Result<Applied<Self::State>>;

    /// # Errors
    /// Only when the tracked state itself is unusable (e.g. no identifier)
    async fn read(&self, current: &Self::State) -> Result<ReadOutcome<Self::State>>;

    /// # Errors
    /// Validation, backend rejection (including redirects), or unresolved references
    /// in strict mode
    async fn update(
        &self,
        current: &Self::State,
        desired: &Self::Spec,
    ) -> Result<Applied<Self::State>>;

    /// # Errors
    /// [`EngineError::RetryExhausted`] when deletion is not confirmed
    async fn delete(&self, current: &Self::State) -> Result<()>;
}

/// Shared collaborators for all reconcilers
#[derive(Clone)]
pub struct Engine {
    transport: Arc<dyn Transport>,
    walker: PaginationWalker,
    retry: RetryPolicy,
    reference_mode: ReferenceMode,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("walker", &self.walker)
            .field("retry", &self.retry)
            .field("reference_mode", &self.reference_mode)
            .finish_non_exhaustive()
    }
}

impl Engine {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: &EngineConfig) -> Self {
        Self {
            transport,
            walker: PaginationWalker::from_config(config),
            retry: RetryPolicy::from_config(config),
            reference_mode: config.reference_mode,
        }
    }

    /// Engine talking HTTP to the configured backend
    ///
    /// # Errors
    /// Returns [`EngineError::Config`] for invalid settings or
    /// [`EngineError::Transport`] if the HTTP client cannot be built
    pub fn connect(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        info!(base_url = %config.base_url, "connected reconciliation engine");
        Ok(Self::new(Arc::new(transport), config))
    }

    #[must_use]
    pub fn projects(&self) -> ProjectReconciler {
        ProjectReconciler::new(self.clone())
    }

    #[must_use]
    pub fn environments(&self) -> EnvironmentReconciler {
        EnvironmentReconciler::new(self.clone())
    }

    #[must_use]
    pub fn groups(&self) -> GroupReconciler {
        GroupReconciler::new(self.clone())
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn walker(&self) -> PaginationWalker {
        self.walker
    }

    pub(crate) fn resolver(&self) -> ReferenceResolver<'_> {
        ReferenceResolver::new(self.transport(), self.walker, self.reference_mode)
    }

    /// POST a create body and recover the created record and its identifier
    ///
    /// A redirect is logged and rejected. A 2xx body that does not parse is tolerated
    /// only when the `Location` header supplies the identifier.
    pub(crate) async fn submit_create<R: WireRecord>(
        &self,
        request: ApiRequest,
    ) -> Result<(R, Vec<Warning>)> {
        let response = self.transport.send(request).await?;
        if response.is_redirect() {
            warn!(
                status = response.status,
                location = response.location.as_deref().unwrap_or_default(),
                "create returned a redirect"
            );
        }
        if !response.is_success() {
            return Err(rejected(R::KIND, "create", &response));
        }

        let mut warnings = Vec::new();
        let (mut record, parse_error) = match normalize_record::<R>(&response.body) {
            Ok(record) => (record, None),
            Err(e) => (R::default(), Some(e)),
        };

        if record.identifier().is_empty() {
            match response
                .location
                .as_deref()
                .and_then(paths::identifier_from_location)
            {
                Some(id) => record.set_identifier(id),
                None => {
                    return Err(match parse_error {
                        Some(e) if !response.body.trim_ascii().is_empty() => e.into(),
                        _ => EngineError::MissingIdentifier { kind: R::KIND },
                    });
                }
            }
        }
        if let Some(e) = parse_error {
            if !response.body.trim_ascii().is_empty() {
                warnings.push(Warning::new(
                    format!("{} create response could not be parsed", R::KIND),
                    e.to_string(),
                ));
            }
        }
        Ok((record, warnings))
    }

    /// Send a full-replace PUT, retrying once on `401`
    ///
    /// Redirects are errors. Returns the parsed record when the body carried one.
    pub(crate) async fn submit_update<R: WireRecord>(
        &self,
        request: ApiRequest,
    ) -> Result<(Option<R>, Vec<Warning>)> {
        let mut response = self.transport.send(request.clone()).await?;
        if response.is_redirect() {
            return Err(rejected(R::KIND, "update", &response));
        }
        if response.is_unauthorized() {
            warn!(kind = %R::KIND, path = %request.path, "update unauthorized, retrying once");
            response = self.transport.send(request).await?;
        }
        if !response.is_success() {
            return Err(rejected(R::KIND, "update", &response));
        }

        let mut warnings = Vec::new();
        if response.body.trim_ascii().is_empty() {
            return Ok((None, warnings));
        }
        match normalize_record::<R>(&response.body) {
            Ok(record) => Ok((Some(record), warnings)),
            Err(e) => {
                warn!(kind = %R::KIND, error = %e, "update response could not be parsed");
                warnings.push(Warning::new(
                    format!("{} update response could not be parsed", R::KIND),
                    format!("{e}; tracked values fall back to the desired configuration"),
                ));
                Ok((None, warnings))
            }
        }
    }

    /// GET a single record from its item endpoint, classifying the outcome
    pub(crate) async fn fetch_item<R: WireRecord>(&self, path: &str) -> Fetched<R> {
        let response = match self.transport.send(ApiRequest::get(path)).await {
            Ok(response) => response,
            Err(e) => {
                return Fetched::Unavailable(Warning::new(
                    format!("{} fetch failed", R::KIND),
                    e.to_string(),
                ));
            }
        };
        if response.is_not_found() {
            return Fetched::NotFound;
        }
        if response.is_redirect() {
            return Fetched::Unavailable(Warning::new(
                format!("{} fetch returned a redirect", R::KIND),
                format!(
                    "status={} location={}",
                    response.status,
                    response.location.as_deref().unwrap_or_default()
                ),
            ));
        }
        if !response.is_success() {
            return Fetched::Unavailable(Warning::new(
                format!("{} fetch failed with status {}", R::KIND, response.status),
                format!("status={} body={}", response.status, response.body_text()),
            ));
        }
        match normalize_record::<R>(&response.body) {
            Ok(record) => Fetched::Found(record),
            Err(e) => Fetched::Unavailable(Warning::new(
                format!("{} response could not be parsed", R::KIND),
                e.to_string(),
            )),
        }
    }

    /// Locate a record by identifier in a full listing
    ///
    /// Absence is never treated as not-found: a listing may be incomplete or stale.
    pub(crate) async fn find_in_listing<R: WireRecord>(
        &self,
        path: &str,
        id: &str,
    ) -> std::result::Result<R, Warning> {
        match self.walker.list_all::<R>(self.transport(), path).await {
            Ok(records) => match records.into_iter().find(|r| r.identifier() == id) {
                Some(record) => Ok(record),
                None => Err(Warning::new(
                    format!("{} not found in listing", R::KIND),
                    format!("{id} is absent from {path}; keeping the last known state"),
                )),
            },
            Err(e) => Err(Warning::new(
                format!("{} listing failed", R::KIND),
                e.to_string(),
            )),
        }
    }

    /// DELETE with the retry policy; `404` and `2xx` are success
    pub(crate) async fn delete_with_retry(&self, kind: ResourceKind, path: &str) -> Result<()> {
        let transport = self.transport();
        self.retry
            .attempt(kind, |_| {
                let request = ApiRequest::delete(path);
                async move {
                    match transport.send(request).await {
                        Ok(response) if response.is_success() || response.is_not_found() => {
                            Attempt::Done(())
                        }
                        Ok(response) => Attempt::Retry(LastFailure::status(
                            response.status,
                            response.body_text(),
                        )),
                        Err(e) => Attempt::Retry(LastFailure::network(&e)),
                    }
                }
            })
            .await
    }
}

/// Classified outcome of fetching one record
#[derive(Debug)]
pub(crate) enum Fetched<R> {
    Found(R),
    NotFound,
    Unavailable(Warning),
}

/// Turn a fetch outcome into a read outcome
pub(crate) fn read_outcome<R, S>(
    kind: ResourceKind,
    fetched: Fetched<R>,
    refresh: impl FnOnce(R) -> Applied<S>,
) -> ReadOutcome<S> {
    match fetched {
        Fetched::Found(record) => ReadOutcome::Refreshed(refresh(record)),
        Fetched::NotFound => {
            info!(kind = %kind, "resource reported not found; dropping tracked state");
            ReadOutcome::Removed
        }
        Fetched::Unavailable(warning) => preserved(kind, warning),
    }
}

pub(crate) fn preserved<S>(kind: ResourceKind, warning: Warning) -> ReadOutcome<S> {
    warn!(kind = %kind, summary = %warning.summary, detail = %warning.detail, "preserving last known state");
    metrics::increment_read_preserved(kind.as_str());
    ReadOutcome::Preserved(warning)
}

pub(crate) fn rejected(kind: ResourceKind, operation: &'static str, response: &ApiResponse) -> EngineError {
    EngineError::BackendRejected {
        kind,
        operation,
        status: response.status,
        body: response.body_text(),
    }
}

/// Reject operations on tracked state that never received an identifier
pub(crate) fn require_identifier(kind: ResourceKind, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EngineError::MissingIdentifier { kind });
    }
    Ok(())
}

/// The parent project cannot change after creation
pub(crate) fn require_same_parent(kind: ResourceKind, current: &str, desired: &str) -> Result<()> {
    if current != desired {
        return Err(EngineError::validation(
            kind,
            format!("project_id is immutable (tracked {current:?}, desired {desired:?})"),
        ));
    }
    Ok(())
}
