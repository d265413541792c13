//! Stub transport shared by the unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::error::ApiError;
use crate::session::{CookieMirror, MemoryStorage, SessionStore};
use crate::transport::{ApiRequest, RawResponse, Transport};

pub const BASE: &str = "http://127.0.0.1:9000/api";

type Handler = dyn Fn(&ApiRequest) -> Result<RawResponse, ApiError> + Send + Sync;

/// Records every request and answers through a handler.
pub struct StubTransport {
    handler: Box<Handler>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl StubTransport {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> Result<RawResponse, ApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            delay: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answers every request with `200 {}` after `delay`.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(|_| Ok(json(StatusCode::OK, &serde_json::json!({})))),
            delay: Some(delay),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests sent with `method`.
    pub fn sent(&self, method: &Method) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == *method)
            .collect()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&request)
    }
}

pub fn json(status: StatusCode, body: &serde_json::Value) -> RawResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    RawResponse {
        status,
        headers,
        body: Bytes::from(serde_json::to_vec(body).unwrap()),
    }
}

pub fn text(status: StatusCode, body: &str) -> RawResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    RawResponse {
        status,
        headers,
        body: Bytes::from(body.to_string()),
    }
}

/// Session over memory storage with a cookie mirror for [`BASE`].
pub fn session() -> (SessionStore, Arc<Jar>) {
    let jar = Arc::new(Jar::default());
    let cookies = CookieMirror::new(Arc::clone(&jar), BASE);
    (SessionStore::new(Arc::new(MemoryStorage::new()), cookies), jar)
}
