//! # Backend Client
//!
//! HTTP plumbing between the reconcilers and the BRMS REST API.
//!
//! Reconcilers talk to a [`Transport`], never to reqwest directly. [`HttpTransport`]
//! is the production implementation; tests substitute a scripted one.
//!
//! Redirects are never followed: a 3xx reaches the reconciler untouched so it can
//! decide whether the redirect is a warning or an error.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, Method};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::Result;
#[cfg(doc)]
use crate::error::EngineError;

/// One request against the backend; `path` is relative to the base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// # Errors
    /// Returns [`EngineError::Serialization`] if the body cannot be encoded as JSON
    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Self::new(Method::POST, path).with_json(body)
    }

    /// # Errors
    /// See [`ApiRequest::post`]
    pub fn put<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Self::new(Method::PUT, path).with_json(body)
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// What came back: status, optional `Location` header, and the raw body
#[derive(Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl fmt::Debug for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiResponse")
            .field("status", &self.status)
            .field("location", &self.location)
            .field("body", &self.body_text())
            .finish()
    }
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            location: None,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Body decoded lossily, for error messages and warnings
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The seam between reconcilers and the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request; any HTTP status is a successful send
    ///
    /// # Errors
    /// Only connection-level failures (DNS, TLS, timeout) are errors
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// reqwest-backed transport with bearer authentication and no redirect following
pub struct HttpTransport {
    http_client: Client,
    base_url: String,
    auth_header: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// # Errors
    /// Returns [`EngineError::Transport`] if the HTTP client cannot be built
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let http_client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.request_timeout)
            .build()?;

        // Add "Bearer " prefix if not already present
        let auth_header = if config.token.starts_with("Bearer ") {
            config.token.clone()
        } else {
            format!("Bearer {}", config.token)
        };

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    fn make_request(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .http_client
            .request(request.method.clone(), &url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").json(body);
        }
        builder
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        debug!(method = %request.method, path = %request.path, "sending backend request");
        let response = self.make_request(&request).send().await?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!(status, path = %request.path, "backend responded");
        Ok(ApiResponse {
            status,
            location,
            body,
        })
    }
}
