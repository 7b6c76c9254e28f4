//! # Pagination Walker
//!
//! Fetches every page of a collection and returns one materialized list.
//!
//! Pages are requested with `perPage`/`page` query parameters, starting at page 1.
//! The walk stops when:
//! - the backend sent no pagination metadata (the page is the whole collection)
//! - the metadata reports `total == 0` or `pageSize == 0`
//! - the accumulated count reaches the reported `total`
//! - a page comes back empty
//!
//! A backend that never satisfies any of these fails with
//! [`EngineError::PaginationLimit`] once `max_pages` pages have been fetched.
//! Partial listings are never returned.

use tracing::debug;

use crate::client::{ApiRequest, Transport};
use crate::config::EngineConfig;
use crate::constants::{PAGE_NUMBER_QUERY_PARAM, PAGE_SIZE_QUERY_PARAM};
use crate::error::{EngineError, Result};
use crate::normalize::{normalize_page, WireRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationWalker {
    page_size: u32,
    max_pages: u32,
}

impl PaginationWalker {
    #[must_use]
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.page_size, config.max_pages)
    }

    /// Walk the collection at `path` and return every record, in backend order
    ///
    /// # Errors
    /// - [`EngineError::BackendRejected`] when a page request returns a non-2xx status
    /// - [`EngineError::Parse`] when a page matches no known listing shape
    /// - [`EngineError::PaginationLimit`] when `max_pages` is exceeded
    /// - [`EngineError::Transport`] on connection failure
    pub async fn list_all<R: WireRecord>(
        &self,
        transport: &dyn Transport,
        path: &str,
    ) -> Result<Vec<R>> {
        let mut records: Vec<R> = Vec::new();

        for page in 1..=self.max_pages {
            let request = ApiRequest::get(path)
                .with_query(PAGE_SIZE_QUERY_PARAM, self.page_size)
                .with_query(PAGE_NUMBER_QUERY_PARAM, page);
            let response = transport.send(request).await?;
            if !response.is_success() {
                return Err(EngineError::BackendRejected {
                    kind: R::KIND,
                    operation: "list",
                    status: response.status,
                    body: response.body_text(),
                });
            }

            let parsed = normalize_page::<R>(&response.body)?;
            let fetched = parsed.items.len();
            records.extend(parsed.items);
            debug!(path, page, fetched, collected = records.len(), "fetched listing page");

            if fetched == 0 {
                return Ok(records);
            }
            let Some(meta) = parsed.paginate else {
                return Ok(records);
            };
            if meta.total == 0 || meta.page_size == 0 || records.len() as u64 >= meta.total {
                return Ok(records);
            }
        }

        Err(EngineError::PaginationLimit {
            path: path.to_string(),
            max_pages: self.max_pages,
        })
    }
}
