//! # Errors
//!
//! Error taxonomy for the reconciliation engine.
//!
//! Recoverable inconsistencies are deliberately absent: they never abort an
//! operation and travel as [`Warning`] values on operation outcomes instead.

use thiserror::Error;

use crate::model::ResourceKind;

/// Result alias used across the engine
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// A response body could not be interpreted as any known encoding
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("could not parse {kind} response: {reason}")]
pub struct ParseError {
    pub kind: ResourceKind,
    pub reason: String,
}

impl ParseError {
    pub fn new(kind: ResourceKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Invalid engine configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Desired configuration failed a static constraint; raised before any network call
    #[error("invalid {kind} configuration: {message}")]
    Validation {
        kind: ResourceKind,
        message: String,
    },

    /// Non-2xx response to a mutating call
    #[error("{kind} {operation} rejected by backend: status={status} body={body}")]
    BackendRejected {
        kind: ResourceKind,
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Creation succeeded but no identifier could be recovered from body or `Location`
    #[error("{kind} created but the backend returned no identifier")]
    MissingIdentifier { kind: ResourceKind },

    /// Only raised in strict reference mode
    #[error("unresolved group references in project {project_id}: {}", names.join(", "))]
    UnresolvedReference {
        project_id: String,
        names: Vec<String>,
    },

    /// Delete did not confirm within the retry budget; carries the last observed outcome verbatim
    #[error("{kind} delete not confirmed after {attempts} attempts: last status={status} body={body}")]
    RetryExhausted {
        kind: ResourceKind,
        attempts: u32,
        status: u16,
        body: String,
    },

    #[error("listing {path} exceeded {max_pages} pages without reaching the reported total")]
    PaginationLimit { path: String, max_pages: u32 },

    #[error("could not encode request body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub(crate) fn validation(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            message: message.into(),
        }
    }

    /// Short label used for metrics and span fields
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "validation",
            EngineError::BackendRejected { .. } => "backend_rejected",
            EngineError::Parse(_) => "parse",
            EngineError::MissingIdentifier { .. } => "missing_identifier",
            EngineError::UnresolvedReference { .. } => "unresolved_reference",
            EngineError::RetryExhausted { .. } => "retry_exhausted",
            EngineError::PaginationLimit { .. } => "pagination_limit",
            EngineError::Serialization(_) => "serialization",
            EngineError::Transport(_) => "transport",
            EngineError::Config(_) => "config",
        }
    }
}

/// A recoverable inconsistency: reported to the caller, never aborts the operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub summary: String,
    pub detail: String,
}

impl Warning {
    pub fn new(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.summary, self.detail)
    }
}
