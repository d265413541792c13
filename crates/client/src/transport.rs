//! HTTP transport seam.
//!
//! [`ApiClient`](crate::ApiClient) builds an [`ApiRequest`] and hands it to a
//! [`Transport`]. Production uses [`ReqwestTransport`]; tests plug in stubs.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::error::ApiError;
use crate::payload::MultipartForm;

/// Body of an outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized JSON.
    Json(Bytes),
    Multipart(MultipartForm),
}

/// A fully built request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// A response as received, before any interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Whether the `Content-Type` header mentions JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends requests over the network.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one request. Must not retry.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if no response was received.
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError>;
}

/// [`Transport`] over `reqwest`, sending and storing cookies in a shared jar.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport that uses `jar` for cookies.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(jar: Arc<Jar>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .user_agent(concat!("skinone/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::transport)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let ApiRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let builder = self.client.request(method, url).headers(headers);
        let builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.body(bytes),
            RequestBody::Multipart(form) => builder.multipart(form.into_reqwest()?),
        };

        let response = builder.send().await.map_err(ApiError::transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(ApiError::transport)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
