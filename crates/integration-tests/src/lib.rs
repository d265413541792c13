//! Integration tests for the Skin One client.
//!
//! The tests drive the real client stack (reqwest transport, cookie jar,
//! session store) against [`StubBackend`], an in-process axum server bound to
//! an ephemeral port that answers the backend routes the client uses.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p skin-one-integration-tests
//! ```
//!
//! # Stub Behavior
//!
//! - `GET /api/auth/csrf/` sets the `csrftoken` cookie
//! - `POST` routes reject requests whose `X-CSRFToken` header does not match
//!   the cookie (403)
//! - Authenticated routes require `Authorization: Bearer` [`STUB_TOKEN`] (401)
//! - Unknown routes answer 404 with a `detail` body
//! - [`SLOW_PATH`] answers only after [`SLOW_DELAY`]

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Token issued by a successful login.
pub const STUB_TOKEN: &str = "stub-token";
/// Value of the `csrftoken` cookie the stub hands out.
pub const STUB_CSRF: &str = "stub-csrf";
/// The only password the stub accepts.
pub const STUB_PASSWORD: &str = "correct horse";
/// Path (relative to the API base) that never answers in time.
pub const SLOW_PATH: &str = "/slow/";
pub const SLOW_DELAY: Duration = Duration::from_secs(5);

/// One multipart upload as the stub received it.
#[derive(Debug, Clone, Default)]
pub struct RecordedUpload {
    pub path: &'static str,
    pub stage: Option<String>,
    pub field_names: Vec<String>,
    pub file_names: Vec<String>,
}

/// What the stub has seen so far.
#[derive(Debug, Default)]
pub struct Recorded {
    pub csrf_probes: usize,
    pub uploads: Vec<RecordedUpload>,
    pub metrics_queries: Vec<HashMap<String, String>>,
    /// `X-Request-Id` of every authenticated or login request
    pub request_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct StubState {
    recorded: Mutex<Recorded>,
}

impl StubState {
    fn record(&self, f: impl FnOnce(&mut Recorded)) {
        let mut guard = self.recorded.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    fn record_request_id(&self, headers: &HeaderMap) {
        if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
            let id = id.to_string();
            self.record(|r| r.request_ids.push(id));
        }
    }
}

/// In-process backend for end-to-end client tests.
///
/// The server task is aborted when the value is dropped.
pub struct StubBackend {
    addr: SocketAddr,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl StubBackend {
    /// Bind to an ephemeral port on 127.0.0.1 and start serving.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the listener cannot be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let state = Arc::new(StubState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = router(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Stub backend stopped: {e}");
            }
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    /// API base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Inspect what the stub has recorded.
    pub fn recorded<R>(&self, f: impl FnOnce(&Recorded) -> R) -> R {
        let guard = self
            .state
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: Arc<StubState>) -> Router {
    let api = Router::new()
        .route("/auth/csrf/", get(csrf))
        .route("/auth/login/", post(login))
        .route("/auth/me/", get(me))
        .route("/images/", get(list_images))
        .route("/images/upload/", post(upload))
        .route("/images/upload/with-stage/", post(upload_with_stage))
        .route("/admin/metrics/", get(metrics))
        .route(SLOW_PATH, get(slow));

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .with_state(state)
}

// =============================================================================
// Helpers
// =============================================================================

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn csrf_valid(headers: &HeaderMap) -> bool {
    let header_ok = headers.get("x-csrftoken").and_then(|v| v.to_str().ok()) == Some(STUB_CSRF);
    let expected = format!("csrftoken={STUB_CSRF}");
    let cookie_ok = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .any(|pair| pair.trim() == expected);
    header_ok && cookie_ok
}

fn bearer_valid(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {STUB_TOKEN}"))
}

/// Shared guard for authenticated routes.
fn check(headers: &HeaderMap, needs_csrf: bool) -> Result<(), Response> {
    if needs_csrf && !csrf_valid(headers) {
        return Err(detail(StatusCode::FORBIDDEN, "CSRF Failed: CSRF token missing."));
    }
    if !bearer_valid(headers) {
        return Err(detail(
            StatusCode::UNAUTHORIZED,
            "Authentication credentials were not provided.",
        ));
    }
    Ok(())
}

async fn read_multipart(
    mut multipart: Multipart,
    upload: &mut RecordedUpload,
) -> Result<usize, Response> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                upload
                    .field_names
                    .push(field.name().unwrap_or_default().to_string());
                if let Some(name) = field.file_name() {
                    upload.file_names.push(name.to_string());
                }
                if field.bytes().await.is_err() {
                    return Err(detail(StatusCode::BAD_REQUEST, "Unreadable multipart part"));
                }
            }
            Ok(None) => break,
            Err(e) => return Err(detail(StatusCode::BAD_REQUEST, &e.body_text())),
        }
    }
    Ok(upload.field_names.iter().filter(|n| *n == "images").count())
}

// =============================================================================
// Handlers
// =============================================================================

async fn csrf(State(state): State<Arc<StubState>>) -> Response {
    state.record(|r| r.csrf_probes += 1);
    (
        [(
            header::SET_COOKIE,
            format!("csrftoken={STUB_CSRF}; Path=/; SameSite=Lax"),
        )],
        Json(json!({ "detail": "CSRF cookie set" })),
    )
        .into_response()
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Credentials>,
) -> Response {
    state.record_request_id(&headers);
    if !csrf_valid(&headers) {
        return detail(StatusCode::FORBIDDEN, "CSRF Failed: CSRF token missing.");
    }
    if body.password != STUB_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Credenciais inválidas" })),
        )
            .into_response();
    }
    Json(json!({
        "token": STUB_TOKEN,
        "user": { "id": "1", "name": "Ana Souza", "email": body.email },
    }))
    .into_response()
}

async fn me(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.record_request_id(&headers);
    if let Err(rejection) = check(&headers, false) {
        return rejection;
    }
    Json(json!({ "id": "1", "name": "Ana Souza", "email": "ana@hospital.org" })).into_response()
}

async fn list_images(headers: HeaderMap) -> Response {
    if let Err(rejection) = check(&headers, false) {
        return rejection;
    }
    Json(json!([
        { "id": 1, "url": "/media/1.jpg", "patient": "Leito 12" },
        { "id": 2, "url": "/media/2.jpg" },
    ]))
    .into_response()
}

async fn upload(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    if let Err(rejection) = check(&headers, true) {
        return rejection;
    }
    let mut upload = RecordedUpload {
        path: "/images/upload/",
        ..RecordedUpload::default()
    };
    let count = match read_multipart(multipart, &mut upload).await {
        Ok(count) => count,
        Err(rejection) => return rejection,
    };
    state.record(|r| r.uploads.push(upload));
    Json(json!({ "success": true, "uploaded": count })).into_response()
}

async fn upload_with_stage(
    State(state): State<Arc<StubState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    if let Err(rejection) = check(&headers, true) {
        return rejection;
    }
    let Some(stage) = query.get("stage").cloned() else {
        return detail(StatusCode::BAD_REQUEST, "stage is required");
    };
    let mut upload = RecordedUpload {
        path: "/images/upload/with-stage/",
        stage: Some(stage.clone()),
        ..RecordedUpload::default()
    };
    let count = match read_multipart(multipart, &mut upload).await {
        Ok(count) => count,
        Err(rejection) => return rejection,
    };
    state.record(|r| r.uploads.push(upload));
    Json(json!({
        "upload_batch_id": "batch-1",
        "uploaded": count,
        "stage": stage,
        "classified": count,
    }))
    .into_response()
}

async fn metrics(
    State(state): State<Arc<StubState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = check(&headers, false) {
        return rejection;
    }
    state.record(|r| r.metrics_queries.push(query));
    Json(json!({
        "total_users": 2,
        "total_images": 30,
        "classified_images_count": 20,
        "unclassified_images_count": 10,
        "classifications_per_category": { "estagio1": 12, "dtpi": 8 },
        "classifications_by_user": [
            { "id": 1, "name": "Ana Souza", "email": "ana@hospital.org", "classification_count": 14 },
            { "id": 2, "name": "Bruno Lima", "email": "bruno@hospital.org", "classification_count": 6 },
        ],
        "daily_classifications": [
            { "date": "2024-03-01", "count": 5 },
            { "date": "2024-03-02", "count": 15 },
        ],
    }))
    .into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(json!({})).into_response()
}

async fn not_found() -> Response {
    detail(StatusCode::NOT_FOUND, "Not found.")
}
