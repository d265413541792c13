//! Application context built once at startup.

use std::sync::Arc;

use reqwest::cookie::Jar;

use crate::api::SkinOneApi;
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::{CookieMirror, FileStorage, MemoryStorage, SessionStore, Storage};
use crate::transport::{ReqwestTransport, Transport};

/// Everything a front end needs to talk to the backend.
///
/// This struct is cheaply cloneable via `Arc`. Build it once and pass it to
/// every component that issues requests or reads session state.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<AppContextInner>,
}

struct AppContextInner {
    config: ClientConfig,
    api: SkinOneApi,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("base_url", &self.inner.config.api_base_url)
            .field("mode", &self.inner.config.mode)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Create the context with the reqwest transport and the configured
    /// session storage.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let jar = Arc::new(Jar::default());
        let transport = Arc::new(ReqwestTransport::new(Arc::clone(&jar))?);
        let storage: Arc<dyn Storage> = match &config.session_file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Using file session storage");
                Arc::new(FileStorage::new(path))
            }
            None => Arc::new(MemoryStorage::new()),
        };
        Ok(Self::with_parts(config, transport, storage, jar))
    }

    /// Create the context from explicit parts.
    ///
    /// `jar` must be the jar `transport` stores response cookies in.
    #[must_use]
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn Storage>,
        jar: Arc<Jar>,
    ) -> Self {
        let cookies = CookieMirror::new(jar, &config.api_base_url);
        let session = SessionStore::new(storage, cookies);
        let client = ApiClient::new(&config, transport, session);
        let api = SkinOneApi::new(client, config.clone());
        Self {
            inner: Arc::new(AppContextInner { config, api }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &SkinOneApi {
        &self.inner.api
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        self.inner.api.client()
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        self.inner.api.session()
    }
}
