//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `SKINONE_API_BASE_URL` - Explicit API base URL (wins when non-blank)
//! - `SKINONE_APP_ORIGIN` - Origin the client acts for (production fallback)
//! - `SKINONE_ENV` - `development` or `production` (default: production)
//! - `SKINONE_DEV_ORIGIN` - Origin of the dev proxy (default: <http://localhost:8080>)
//! - `SKINONE_GOOGLE_CLIENT_ID` - Google OAuth client identifier
//! - `SKINONE_BYPASS_AUTH` - Skip login gating, honored in development only
//! - `SKINONE_ADMIN_EMAILS` - Comma-separated admin allowlist
//! - `SKINONE_USE_MOCKS` - Serve admin metrics from built-in sample data
//! - `SKINONE_REQUEST_TIMEOUT_SECS` - Timeout race budget (default: 30)
//! - `SKINONE_SESSION_FILE` - Session file path (default: platform data dir)
//! - `SKINONE_HTTP_TRACE` - Request/response tracing (default: on in development)

use std::path::PathBuf;
use std::time::Duration;

use skin_one_core::AdminAllowlist;
use thiserror::Error;

/// Default timeout race budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Path the development proxy serves the API under.
pub const DEV_PROXY_PATH: &str = "/api";

/// Origin of the development proxy when none is configured.
pub const DEFAULT_DEV_ORIGIN: &str = "http://localhost:8080";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Whether the client runs against a development setup or production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    Development,
    #[default]
    Production,
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("expected development or production, got {other}")),
        }
    }
}

/// Skin One client configuration.
///
/// `api_base_url` is resolved once at load time and never changes for the
/// lifetime of the client built from it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Resolved API base URL without a trailing slash. May be empty.
    pub api_base_url: String,
    /// Origin the client acts for, if known
    pub app_origin: Option<String>,
    pub mode: RunMode,
    /// Google OAuth client identifier (public by nature)
    pub google_client_id: Option<String>,
    /// Requested auth bypass. See [`ClientConfig::auth_bypass_active`].
    pub bypass_auth: bool,
    pub admin_emails: AdminAllowlist,
    /// Serve admin metrics from sample data instead of the network
    pub use_mocks: bool,
    pub request_timeout: Duration,
    /// Durable session file; `None` keeps the session in memory
    pub session_file: Option<PathBuf>,
    /// Trace requests and responses with credentials redacted
    pub http_trace: bool,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = match get("SKINONE_ENV") {
            Some(raw) => raw
                .parse::<RunMode>()
                .map_err(|e| ConfigError::InvalidEnvVar("SKINONE_ENV".to_string(), e))?,
            None => RunMode::default(),
        };
        let app_origin = get("SKINONE_APP_ORIGIN");
        let dev_origin = get("SKINONE_DEV_ORIGIN").unwrap_or_else(|| DEFAULT_DEV_ORIGIN.to_string());
        let api_base_url = resolve_base_url(
            get("SKINONE_API_BASE_URL").as_deref(),
            mode,
            &dev_origin,
            app_origin.as_deref(),
        );

        let request_timeout = match get("SKINONE_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar("SKINONE_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        let session_file = get("SKINONE_SESSION_FILE")
            .map(PathBuf::from)
            .or_else(default_session_file);

        Ok(Self {
            api_base_url,
            app_origin,
            mode,
            google_client_id: get("SKINONE_GOOGLE_CLIENT_ID"),
            bypass_auth: parse_flag(get("SKINONE_BYPASS_AUTH"), "SKINONE_BYPASS_AUTH", false)?,
            admin_emails: AdminAllowlist::parse(&get("SKINONE_ADMIN_EMAILS").unwrap_or_default()),
            use_mocks: parse_flag(get("SKINONE_USE_MOCKS"), "SKINONE_USE_MOCKS", false)?,
            request_timeout,
            session_file,
            http_trace: parse_flag(
                get("SKINONE_HTTP_TRACE"),
                "SKINONE_HTTP_TRACE",
                mode == RunMode::Development,
            )?,
        })
    }

    /// Configuration pointing at a known base URL with everything else at
    /// defaults and an in-memory session.
    #[must_use]
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            api_base_url: base_url.trim_end_matches('/').to_string(),
            app_origin: None,
            mode: RunMode::Production,
            google_client_id: None,
            bypass_auth: false,
            admin_emails: AdminAllowlist::default(),
            use_mocks: false,
            request_timeout: DEFAULT_TIMEOUT,
            session_file: None,
            http_trace: false,
        }
    }

    /// The bypass flag only takes effect in development.
    #[must_use]
    pub fn auth_bypass_active(&self) -> bool {
        self.bypass_auth && self.mode == RunMode::Development
    }
}

/// Resolve the API base URL.
///
/// Priority: an explicit non-blank value, then the development proxy path
/// under `dev_origin`, then the app's own origin in production, then the
/// empty string (logged, not fatal). Trailing slashes are removed.
#[must_use]
pub fn resolve_base_url(
    explicit: Option<&str>,
    mode: RunMode,
    dev_origin: &str,
    app_origin: Option<&str>,
) -> String {
    let resolved = if let Some(url) = explicit.map(str::trim).filter(|u| !u.is_empty()) {
        url.to_string()
    } else if mode == RunMode::Development {
        format!("{}{DEV_PROXY_PATH}", dev_origin.trim().trim_end_matches('/'))
    } else if let Some(origin) = app_origin.map(str::trim).filter(|o| !o.is_empty()) {
        origin.to_string()
    } else {
        String::new()
    };

    let resolved = resolved.trim_end_matches('/').to_string();
    if resolved.is_empty() {
        tracing::warn!("SKINONE_API_BASE_URL is not set. API requests will fail.");
    }
    resolved
}

fn default_session_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("skinone").join("session.json"))
}

fn parse_flag(raw: Option<String>, key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got {other}"),
        )),
    }
}
