//! # Constants
//!
//! Shared constants used throughout the reconciler.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default per-request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of delete attempts before giving up
pub const DEFAULT_DELETE_MAX_ATTEMPTS: u32 = 3;

/// Default fixed delay between delete attempts (milliseconds)
pub const DEFAULT_DELETE_RETRY_DELAY_MS: u64 = 400;

/// Default page size requested when walking a paginated listing
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Default ceiling on the number of pages fetched for a single listing
/// A backend that never satisfies the termination predicate fails here instead of looping
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Query parameter carrying the requested page size
pub const PAGE_SIZE_QUERY_PARAM: &str = "perPage";

/// Query parameter carrying the 1-based page number
pub const PAGE_NUMBER_QUERY_PARAM: &str = "page";

/// Pattern every project key must match
pub const PROJECT_KEY_PATTERN: &str = r"^[a-z0-9]{2,}(-[a-z0-9]+)*$";

/// Default tracing filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "brms_reconciler=info,brmsctl=info";
