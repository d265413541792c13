//! Transport client.
//!
//! [`ApiClient`] turns a relative path and payload into a request against the
//! configured base URL, attaches the session and CSRF headers, races the
//! request against the timeout and maps the response to a typed value or an
//! [`ApiError`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::{Deserialize, DeserializeOwned};
use tokio::time::Instant;
use tracing::instrument;

use crate::config::ClientConfig;
use crate::csrf::{CSRF_HEADER, CsrfBootstrap, CsrfOutcome, REQUESTED_WITH_HEADER, REQUESTED_WITH_VALUE};
use crate::error::ApiError;
use crate::payload::Payload;
use crate::session::SessionStore;
use crate::transport::{ApiRequest, RawResponse, RequestBody, Transport};

/// Per-request correlation header.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Headers never written to logs.
const REDACTED_HEADERS: [&str; 4] = ["authorization", "cookie", "set-cookie", CSRF_HEADER];

/// A parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The response declared JSON. A body that failed to parse is `Null`.
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    fn from_raw(raw: &RawResponse) -> Self {
        if raw.is_json() {
            Self::Json(serde_json::from_slice(&raw.body).unwrap_or(serde_json::Value::Null))
        } else {
            Self::Text(raw.text())
        }
    }

    /// The body as a JSON value. Text becomes a JSON string; empty text
    /// becomes `null`.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) if text.is_empty() => serde_json::Value::Null,
            Self::Text(text) => serde_json::Value::String(text),
        }
    }

    /// Server-supplied error message: `message`, then `detail`.
    fn error_message(&self) -> Option<String> {
        let Self::Json(value) = self else {
            return None;
        };
        ["message", "detail"]
            .iter()
            .filter_map(|key| value.get(key))
            .find_map(|v| match v {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Null | serde_json::Value::String(_) | serde_json::Value::Bool(false) => None,
                other => Some(other.to_string()),
            })
    }
}

/// HTTP client for the Skin One backend.
///
/// Cheap to clone; clones share the transport, session and CSRF state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    base_url: String,
    transport: Arc<dyn Transport>,
    session: SessionStore,
    csrf: CsrfBootstrap,
    timeout: Duration,
    trace: bool,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for `config.api_base_url`.
    ///
    /// The CSRF cookie is read through the session's cookie mirror, so the
    /// transport must share that mirror's jar.
    #[must_use]
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>, session: SessionStore) -> Self {
        let csrf = CsrfBootstrap::new(session.cookies().clone());
        Self {
            inner: Arc::new(ApiClientInner {
                base_url: config.api_base_url.trim_end_matches('/').to_string(),
                transport,
                session,
                csrf,
                timeout: config.request_timeout,
                trace: config.http_trace,
            }),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// `base_url` followed by `path` with exactly one slash between them.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.inner.base_url)
        } else {
            format!("{}/{path}", self.inner.base_url)
        }
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, Payload::Empty).await
    }

    /// POST a payload. An empty payload is sent as `{}`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: impl Into<Payload> + Send,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, payload.into()).await
    }

    /// POST any serializable value as JSON.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post_json<T: DeserializeOwned, B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, Payload::json(body)?).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: impl Into<Payload> + Send,
    ) -> Result<T, ApiError> {
        self.request(Method::PUT, path, payload.into()).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn put_json<T: DeserializeOwned, B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::PUT, path, Payload::json(body)?).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::DELETE, path, Payload::Empty).await
    }

    /// Send a request and decode the body into `T`.
    ///
    /// # Errors
    ///
    /// - `ApiError::RequestTimeout` if no response arrives in time
    /// - `ApiError::Api` for a non-2xx status
    /// - `ApiError::Transport` if the request could not be sent
    /// - `ApiError::Decode` if the body does not have the shape of `T`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<T, ApiError> {
        let (status, body) = self.request_raw(method, path, payload).await?;
        let value = body.into_value();
        <T as Deserialize>::deserialize(&value).map_err(|source| ApiError::Decode {
            status,
            source,
            body: value,
        })
    }

    /// Send a request and return the status with the parsed body, without
    /// decoding it further.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::request`] except for `Decode`.
    #[instrument(skip(self, payload))]
    pub async fn request_raw(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<(u16, ResponseBody), ApiError> {
        // One budget covers the CSRF bootstrap and the request itself
        let started = Instant::now();
        let deadline = started + self.inner.timeout;
        let request = self.build_request(method, path, payload, deadline).await?;
        if Instant::now() >= deadline {
            return Err(ApiError::RequestTimeout(self.inner.timeout));
        }
        if self.inner.trace {
            tracing::debug!(
                url = %request.url,
                headers = ?redacted(&request.headers),
                body = %body_summary(&request.body),
                "Sending request"
            );
        }

        let raw = tokio::time::timeout_at(deadline, self.inner.transport.send(request))
            .await
            .map_err(|_| ApiError::RequestTimeout(self.inner.timeout))??;

        let status = raw.status;
        if self.inner.trace {
            tracing::debug!(
                status = status.as_u16(),
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                headers = ?redacted(&raw.headers),
                "Received response"
            );
        }

        let body = ResponseBody::from_raw(&raw);
        if !status.is_success() {
            let message = body
                .error_message()
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "Request failed".to_string());
            let details = match body.into_value() {
                serde_json::Value::Null => None,
                value => Some(value),
            };
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
                details,
            });
        }

        Ok((status.as_u16(), body))
    }

    /// Run the CSRF bootstrap now instead of before the first unsafe request.
    ///
    /// The bootstrap gets one request timeout in total.
    pub async fn ensure_csrf_cookie(&self) -> CsrfOutcome {
        self.ensure_csrf_by(Instant::now() + self.inner.timeout).await
    }

    async fn ensure_csrf_by(&self, deadline: Instant) -> CsrfOutcome {
        self.inner
            .csrf
            .ensure(self.inner.transport.as_ref(), &self.inner.base_url, deadline)
            .await
    }

    async fn build_request(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        deadline: Instant,
    ) -> Result<ApiRequest, ApiError> {
        let raw_url = self.url_for(path);
        let url = url::Url::parse(&raw_url).map_err(|e| ApiError::InvalidUrl {
            url: raw_url.clone(),
            reason: e.to_string(),
        })?;

        let mut headers = HeaderMap::new();
        if !payload.is_multipart() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        headers.extend(self.inner.session.auth_header());

        if is_unsafe(&method) {
            if self.ensure_csrf_by(deadline).await.has_token()
                && let Some(token) = self.inner.csrf.token()
            {
                let mut value = HeaderValue::from_str(&token)
                    .map_err(|_| ApiError::InvalidHeader(CSRF_HEADER))?;
                value.set_sensitive(true);
                headers.insert(HeaderName::from_static(CSRF_HEADER), value);
            }
            headers.insert(
                HeaderName::from_static(REQUESTED_WITH_HEADER),
                HeaderValue::from_static(REQUESTED_WITH_VALUE),
            );
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }

        let body = match payload {
            Payload::Empty if method == Method::POST => RequestBody::Json(Bytes::from_static(b"{}")),
            Payload::Empty => RequestBody::Empty,
            Payload::Json(value) => {
                RequestBody::Json(Bytes::from(serde_json::to_vec(&value).map_err(ApiError::Serialize)?))
            }
            Payload::Multipart(form) => RequestBody::Multipart(form),
        };

        Ok(ApiRequest {
            method,
            url,
            headers,
            body,
        })
    }
}

fn is_unsafe(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE | Method::PATCH)
}

fn redacted(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if REDACTED_HEADERS.contains(&name.as_str()) || value.is_sensitive() {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[binary]").to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

fn body_summary(body: &RequestBody) -> String {
    match body {
        RequestBody::Empty => "empty".to_string(),
        RequestBody::Json(bytes) => format!("json ({} bytes)", bytes.len()),
        RequestBody::Multipart(form) => format!("multipart ({} parts)", form.parts().len()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::StatusCode;
    use reqwest::header::AUTHORIZATION;
    use secrecy::SecretString;
    use serde_json::{Value, json};

    use super::*;
    use crate::payload::{ImageFile, MultipartForm};
    use crate::testing::{self, BASE, StubTransport};

    fn client(transport: Arc<StubTransport>) -> (ApiClient, Arc<reqwest::cookie::Jar>) {
        let (session, jar) = testing::session();
        let config = ClientConfig::for_base_url(BASE);
        (ApiClient::new(&config, transport, session), jar)
    }

    fn ok_json(body: Value) -> Arc<StubTransport> {
        StubTransport::new(move |_| Ok(testing::json(StatusCode::OK, &body)))
    }

    #[test]
    fn test_url_for_joins_with_one_slash() {
        let (client, _) = client(ok_json(json!({})));
        assert_eq!(client.url_for("/images/"), format!("{BASE}/images/"));
        assert_eq!(client.url_for("images/"), format!("{BASE}/images/"));
        assert_eq!(client.url_for(""), format!("{BASE}/"));
    }

    #[tokio::test]
    async fn test_get_decodes_json() {
        let transport = ok_json(json!([{"id": 1, "url": "http://x/1.jpg"}]));
        let (client, _) = client(transport.clone());

        let images: Vec<crate::models::ImageItem> = client.get("/images/").await.unwrap();
        assert_eq!(images[0].id.as_str(), "1");

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(sent[0].url.as_str(), format!("{BASE}/images/"));
        assert_eq!(sent[0].headers[CONTENT_TYPE], "application/json");
        assert!(sent[0].headers.get(AUTHORIZATION).is_none());
        assert!(sent[0].headers.get(CSRF_HEADER).is_none());
        assert!(sent[0].headers.get(REQUEST_ID_HEADER).is_some());
        assert_eq!(sent[0].body, RequestBody::Empty);
    }

    #[tokio::test]
    async fn test_bearer_header_when_authenticated() {
        let transport = ok_json(json!({}));
        let (client, _) = client(transport.clone());
        client
            .session()
            .set_token(&SecretString::from("T1".to_string()))
            .unwrap();

        let _: Value = client.get("/auth/me/").await.unwrap();
        assert_eq!(transport.requests()[0].headers[AUTHORIZATION], "Bearer T1");
    }

    #[tokio::test]
    async fn test_post_json_body_and_csrf() {
        let jar_slot: Arc<std::sync::Mutex<Option<Arc<reqwest::cookie::Jar>>>> = Arc::default();
        let slot = Arc::clone(&jar_slot);
        let transport = StubTransport::new(move |req| {
            if req.url.path().ends_with("/auth/csrf/")
                && let Some(jar) = slot.lock().unwrap().as_ref()
            {
                jar.add_cookie_str("csrftoken=abc; Path=/", &req.url);
            }
            Ok(testing::json(StatusCode::CREATED, &json!({"ok": true})))
        });
        let (client, jar) = client(transport.clone());
        *jar_slot.lock().unwrap() = Some(jar);

        let body = json!({"image_id": "7", "stage": "estagio1"});
        let _: Value = client.post("/classifications/", body.clone()).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].url.path(), "/api/auth/csrf/");
        let post = &sent[1];
        assert_eq!(post.headers[CSRF_HEADER], "abc");
        assert_eq!(post.headers[REQUESTED_WITH_HEADER], "XMLHttpRequest");
        assert_eq!(post.headers[CONTENT_TYPE], "application/json");
        let RequestBody::Json(bytes) = &post.body else {
            panic!("expected JSON body");
        };
        assert_eq!(serde_json::from_slice::<Value>(bytes).unwrap(), body);
    }

    #[tokio::test]
    async fn test_unsafe_request_without_csrf_cookie_proceeds() {
        let transport = ok_json(json!({}));
        let (client, _) = client(transport.clone());

        let _: Value = client.delete("/images/1/").await.unwrap();
        let sent = transport.requests();
        // csrf probe, me probe, then the delete itself
        assert_eq!(sent.len(), 3);
        let delete = &sent[2];
        assert_eq!(delete.method, Method::DELETE);
        assert!(delete.headers.get(CSRF_HEADER).is_none());
        assert_eq!(delete.headers[REQUESTED_WITH_HEADER], "XMLHttpRequest");
        assert_eq!(delete.body, RequestBody::Empty);
    }

    #[tokio::test]
    async fn test_empty_post_sends_braces_and_empty_put_sends_nothing() {
        let transport = ok_json(json!({}));
        let (client, _) = client(transport.clone());

        let _: Value = client.post("/auth/logout/", ()).await.unwrap();
        let _: Value = client.put("/profile/", ()).await.unwrap();

        let posts = transport.sent(&Method::POST);
        let puts = transport.sent(&Method::PUT);
        assert_eq!(posts[0].body, RequestBody::Json(Bytes::from_static(b"{}")));
        assert_eq!(puts[0].body, RequestBody::Empty);
    }

    #[tokio::test]
    async fn test_multipart_has_no_json_content_type() {
        let transport = ok_json(json!({"success": true}));
        let (client, _) = client(transport.clone());

        let form = MultipartForm::with_files("images", [ImageFile::new("a.jpg", vec![1_u8, 2])]);
        let _: Value = client.post("/images/upload/", form).await.unwrap();

        let upload = &transport.sent(&Method::POST)[0];
        assert!(upload.headers.get(CONTENT_TYPE).is_none());
        assert!(matches!(upload.body, RequestBody::Multipart(_)));
    }

    #[tokio::test]
    async fn test_error_detail_becomes_message() {
        let transport = StubTransport::new(|_| {
            Ok(testing::json(StatusCode::NOT_FOUND, &json!({"detail": "not found"})))
        });
        let (client, _) = client(transport);

        let err = client.get::<Value>("/missing/").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "not found");
        assert_eq!(err.details(), Some(&json!({"detail": "not found"})));
    }

    #[tokio::test]
    async fn test_message_preferred_over_detail() {
        let transport = StubTransport::new(|_| {
            Ok(testing::json(
                StatusCode::BAD_REQUEST,
                &json!({"message": "bad email", "detail": "other"}),
            ))
        });
        let (client, _) = client(transport);
        let err = client.get::<Value>("/x/").await.unwrap_err();
        assert_eq!(err.to_string(), "bad email");
    }

    #[tokio::test]
    async fn test_error_falls_back_to_status_text() {
        let transport =
            StubTransport::new(|_| Ok(testing::text(StatusCode::INTERNAL_SERVER_ERROR, "boom")));
        let (client, _) = client(transport);

        let err = client.get::<Value>("/x/").await.unwrap_err();
        assert_eq!(err.to_string(), "Internal Server Error");
        assert_eq!(err.details(), Some(&json!("boom")));
    }

    #[tokio::test]
    async fn test_unparseable_json_error_body() {
        let transport = StubTransport::new(|_| {
            let mut raw = testing::json(StatusCode::BAD_GATEWAY, &json!(null));
            raw.body = Bytes::from_static(b"<html>");
            Ok(raw)
        });
        let (client, _) = client(transport);

        let err = client.get::<Value>("/x/").await.unwrap_err();
        assert_eq!(err.to_string(), "Bad Gateway");
        assert_eq!(err.details(), None);
    }

    #[tokio::test]
    async fn test_text_body_success() {
        let transport = StubTransport::new(|_| Ok(testing::text(StatusCode::OK, "pong")));
        let (client, _) = client(transport);
        let body: String = client.get("/ping").await.unwrap();
        assert_eq!(body, "pong");
    }

    #[tokio::test]
    async fn test_decode_mismatch() {
        let transport = ok_json(json!({"unexpected": true}));
        let (client, _) = client(transport);

        let err = client
            .get::<crate::models::UploadSingleResponse>("/x/")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let transport = StubTransport::slow(Duration::from_secs(5));
        let (session, _) = testing::session();
        let mut config = ClientConfig::for_base_url(BASE);
        config.request_timeout = Duration::from_millis(50);
        let client = ApiClient::new(&config, transport, session);

        let err = client.get::<Value>("/slow/").await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.status(), Some(408));
    }

    #[tokio::test]
    async fn test_post_timeout_includes_csrf_bootstrap() {
        let transport = StubTransport::slow(Duration::from_secs(5));
        let (session, _) = testing::session();
        let mut config = ClientConfig::for_base_url(BASE);
        config.request_timeout = Duration::from_millis(200);
        let client = ApiClient::new(&config, Arc::<StubTransport>::clone(&transport), session);

        let started = Instant::now();
        let err = client
            .post::<Value>("/classifications/", json!({}))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_millis(400));
        // Only the CSRF probe went out; the POST itself was never sent
        assert_eq!(transport.requests().len(), 1);
        assert!(transport.sent(&Method::POST).is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let transport = StubTransport::new(|_| Err(ApiError::transport("connection refused")));
        let (client, _) = client(transport);
        let err = client.get::<Value>("/x/").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_empty_base_url_is_invalid() {
        let transport = ok_json(json!({}));
        let (session, _) = testing::session();
        let client = ApiClient::new(&ClientConfig::for_base_url(""), transport.clone(), session);

        let err = client.get::<Value>("/images/").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_redacted_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer T"));
        headers.insert(HeaderName::from_static(CSRF_HEADER), HeaderValue::from_static("c"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let shown = redacted(&headers);
        assert!(shown.iter().all(|(_, v)| v != "Bearer T" && v != "c"));
        assert!(shown.contains(&("content-type".to_string(), "application/json".to_string())));
    }
}
