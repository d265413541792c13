//! CSRF cookie bootstrap.
//!
//! The backend issues its anti-forgery token as a cookie. Before the first
//! state-changing request the client makes sure that cookie exists, probing
//! cookie-issuing endpoints when it does not. The token is never generated
//! locally.

use std::sync::Arc;
use reqwest::Method;
use reqwest::header::HeaderMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::endpoints;
use crate::session::CookieMirror;
use crate::transport::{ApiRequest, RequestBody, Transport};

/// Cookie the backend stores the token in.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Header the token is echoed back in.
pub const CSRF_HEADER: &str = "x-csrftoken";

/// Header marking the request as an XHR call.
pub const REQUESTED_WITH_HEADER: &str = "x-requested-with";

/// Value of [`REQUESTED_WITH_HEADER`].
pub const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";

/// Result of [`CsrfBootstrap::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfOutcome {
    /// The cookie was already there; no probe was sent.
    AlreadyPresent,
    /// A probe caused the backend to set the cookie.
    Acquired,
    /// Every probe ran and no cookie appeared.
    Unavailable,
}

impl CsrfOutcome {
    /// Whether a token can now be attached.
    #[must_use]
    pub const fn has_token(self) -> bool {
        matches!(self, Self::AlreadyPresent | Self::Acquired)
    }
}

/// Best-effort acquisition of the CSRF cookie.
#[derive(Debug, Clone)]
pub struct CsrfBootstrap {
    cookies: CookieMirror,
    lock: Arc<Mutex<()>>,
}

impl CsrfBootstrap {
    #[must_use]
    pub fn new(cookies: CookieMirror) -> Self {
        Self {
            cookies,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Current token, if the cookie is set and non-empty.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.cookies.get(CSRF_COOKIE).filter(|t| !t.is_empty())
    }

    /// Make sure the CSRF cookie exists.
    ///
    /// Probes `GET /auth/csrf/` then `GET /auth/me/`, stopping at the first
    /// one after which the cookie is present. Probe failures are logged and
    /// otherwise ignored. Concurrent callers wait for a single bootstrap.
    ///
    /// Waiting for the lock and every probe share `deadline`; once it passes
    /// no further probe is sent.
    pub async fn ensure(
        &self,
        transport: &dyn Transport,
        base_url: &str,
        deadline: Instant,
    ) -> CsrfOutcome {
        if self.token().is_some() {
            return CsrfOutcome::AlreadyPresent;
        }

        let Ok(_guard) = tokio::time::timeout_at(deadline, self.lock.lock()).await else {
            tracing::debug!("Gave up waiting for the CSRF bootstrap");
            return CsrfOutcome::Unavailable;
        };
        if self.token().is_some() {
            return CsrfOutcome::AlreadyPresent;
        }

        for path in [endpoints::auth::csrf(), endpoints::auth::me()] {
            if Instant::now() >= deadline {
                tracing::debug!(path, "CSRF bootstrap out of time");
                break;
            }
            let url = match url::Url::parse(&format!("{base_url}{path}")) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!(path, error = %e, "Skipping CSRF probe with invalid URL");
                    continue;
                }
            };
            let request = ApiRequest {
                method: Method::GET,
                url,
                headers: HeaderMap::new(),
                body: RequestBody::Empty,
            };
            match tokio::time::timeout_at(deadline, transport.send(request)).await {
                Ok(Ok(response)) => {
                    tracing::debug!(path, status = %response.status, "CSRF probe answered");
                }
                Ok(Err(e)) => tracing::debug!(path, error = %e, "CSRF probe failed"),
                Err(_) => tracing::debug!(path, "CSRF probe timed out"),
            }
            if self.token().is_some() {
                return CsrfOutcome::Acquired;
            }
        }

        tracing::debug!("No CSRF cookie after bootstrap; continuing without it");
        CsrfOutcome::Unavailable
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use reqwest::cookie::Jar;

    use super::*;
    use crate::error::ApiError;
    use crate::transport::RawResponse;

    const BASE: &str = "http://127.0.0.1:9000/api";

    /// Sets the CSRF cookie when `issuing_path` is requested; fails on
    /// paths listed in `failing`.
    struct ProbeStub {
        jar: Arc<Jar>,
        issuing_path: Option<&'static str>,
        failing: &'static [&'static str],
        calls: std::sync::Mutex<Vec<String>>,
        count: AtomicUsize,
    }

    impl ProbeStub {
        fn new(
            jar: Arc<Jar>,
            issuing_path: Option<&'static str>,
            failing: &'static [&'static str],
        ) -> Self {
            Self {
                jar,
                issuing_path,
                failing,
                calls: std::sync::Mutex::new(Vec::new()),
                count: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ProbeStub {
        async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
            let path = request.url.path().to_string();
            self.calls.lock().unwrap().push(path.clone());
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|p| path.ends_with(p)) {
                return Err(ApiError::transport("connection reset"));
            }
            if self.issuing_path.is_some_and(|p| path.ends_with(p)) {
                self.jar
                    .add_cookie_str("csrftoken=tok123; Path=/", &request.url);
            }
            Ok(RawResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::new(),
            })
        }
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    fn bootstrap(jar: &Arc<Jar>) -> CsrfBootstrap {
        CsrfBootstrap::new(CookieMirror::new(Arc::clone(jar), BASE))
    }

    #[tokio::test]
    async fn test_already_present_skips_probes() {
        let jar = Arc::new(Jar::default());
        let csrf = bootstrap(&jar);
        csrf.cookies.set(CSRF_COOKIE, "existing", 60);
        let stub = ProbeStub::new(Arc::clone(&jar), None, &[]);

        let outcome = csrf.ensure(&stub, BASE, soon()).await;
        assert_eq!(outcome, CsrfOutcome::AlreadyPresent);
        assert!(stub.calls().is_empty());
        assert_eq!(csrf.token().as_deref(), Some("existing"));
    }

    #[tokio::test]
    async fn test_first_probe_acquires() {
        let jar = Arc::new(Jar::default());
        let csrf = bootstrap(&jar);
        let stub = ProbeStub::new(Arc::clone(&jar), Some("/auth/csrf/"), &[]);

        let outcome = csrf.ensure(&stub, BASE, soon()).await;
        assert_eq!(outcome, CsrfOutcome::Acquired);
        assert_eq!(stub.calls(), ["/api/auth/csrf/"]);
        assert_eq!(csrf.token().as_deref(), Some("tok123"));
    }

    #[tokio::test]
    async fn test_falls_back_to_me_after_failure() {
        let jar = Arc::new(Jar::default());
        let csrf = bootstrap(&jar);
        let stub = ProbeStub::new(Arc::clone(&jar), Some("/auth/me/"), &["/auth/csrf/"]);

        let outcome = csrf.ensure(&stub, BASE, soon()).await;
        assert_eq!(outcome, CsrfOutcome::Acquired);
        assert_eq!(stub.calls(), ["/api/auth/csrf/", "/api/auth/me/"]);
    }

    #[tokio::test]
    async fn test_unavailable_is_not_an_error() {
        let jar = Arc::new(Jar::default());
        let csrf = bootstrap(&jar);
        let stub = ProbeStub::new(Arc::clone(&jar), None, &["/auth/me/"]);

        let outcome = csrf.ensure(&stub, BASE, soon()).await;
        assert_eq!(outcome, CsrfOutcome::Unavailable);
        assert!(!outcome.has_token());
        assert_eq!(stub.count.load(Ordering::SeqCst), 2);
        assert!(csrf.token().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callers_probe_once() {
        let jar = Arc::new(Jar::default());
        let csrf = bootstrap(&jar);
        let stub = ProbeStub::new(Arc::clone(&jar), Some("/auth/csrf/"), &[]);

        let (a, b) = tokio::join!(
            csrf.ensure(&stub, BASE, soon()),
            csrf.ensure(&stub, BASE, soon()),
        );
        assert!(a.has_token() && b.has_token());
        assert_eq!(stub.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probes_stop_at_deadline() {
        let jar = Arc::new(Jar::default());
        let csrf = bootstrap(&jar);
        let stub = crate::testing::StubTransport::slow(Duration::from_secs(5));

        let started = Instant::now();
        let outcome = csrf
            .ensure(stub.as_ref(), BASE, started + Duration::from_millis(100))
            .await;

        assert_eq!(outcome, CsrfOutcome::Unavailable);
        assert!(started.elapsed() < Duration::from_secs(1));
        // The first probe used up the budget; the second was never sent
        assert_eq!(stub.requests().len(), 1);
    }
}
