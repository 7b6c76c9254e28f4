//! Common test utilities for integration tests
//!
//! Provides a scripted in-memory [`Transport`] that replays canned responses per
//! route and records every request, plus rustls setup for the Pact tests.

#![allow(dead_code, reason = "each test binary uses a different subset of helpers")]

use async_trait::async_trait;
use brms_reconciler::client::{ApiRequest, ApiResponse, Transport};
use brms_reconciler::{Engine, EngineConfig, EngineError};
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

#[derive(Clone)]
enum Reply {
    Response(ApiResponse),
    NetworkError,
}

/// Replays responses per `(method, path)`; the last reply of a route repeats
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn on(&self, method: Method, path: &str, response: ApiResponse) -> &Self {
        self.push(method, path, Reply::Response(response))
    }

    pub fn on_json(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.on(method, path, json(status, &body))
    }

    /// Fail the next request on this route at the connection level
    pub fn on_network_error(&self, method: Method, path: &str) -> &Self {
        self.push(method, path, Reply::NetworkError)
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.method == method && r.path == path)
            .count()
    }

    /// Body of the most recent request on this route
    pub fn last_body(&self, method: &Method, path: &str) -> Option<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| &r.method == method && r.path == path)
            .and_then(|r| r.body.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> brms_reconciler::Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = {
            let mut routes = self.routes.lock().unwrap();
            let queue = routes
                .get_mut(&(request.method.clone(), request.path.clone()))
                .unwrap_or_else(|| panic!("no scripted reply for {} {}", request.method, request.path));
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            }
        };
        match reply {
            Reply::Response(response) => Ok(response),
            Reply::NetworkError => Err(network_error()),
        }
    }
}

/// A real connection-level reqwest error, without touching the network
pub fn network_error() -> EngineError {
    let err = reqwest::Client::new()
        .get("http://")
        .build()
        .expect_err("an empty host is not a valid URL");
    EngineError::Transport(err)
}

pub fn json(status: u16, body: &Value) -> ApiResponse {
    ApiResponse::new(status, serde_json::to_vec(body).unwrap())
}

pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::new("http://brms.test", "test-token");
    config.delete_retry_delay = Duration::ZERO;
    config
}

pub fn engine(transport: &Arc<ScriptedTransport>) -> Engine {
    engine_with(transport, test_config())
}

pub fn engine_with(transport: &Arc<ScriptedTransport>, config: EngineConfig) -> Engine {
    let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
    Engine::new(transport, &config)
}
