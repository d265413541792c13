//! Cookie access over the jar shared with the HTTP transport.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use url::Url;

/// Reads and writes cookies for the API origin.
///
/// The jar is the same one the transport sends and receives cookies with, so
/// a cookie written here accompanies the next request and a `Set-Cookie` from
/// the backend is visible here.
#[derive(Clone)]
pub struct CookieMirror {
    jar: Arc<Jar>,
    url: Option<Url>,
}

impl std::fmt::Debug for CookieMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieMirror")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl CookieMirror {
    /// Scope the mirror to the origin of `base_url`.
    ///
    /// A base URL that does not parse as an absolute URL yields a detached
    /// mirror.
    #[must_use]
    pub fn new(jar: Arc<Jar>, base_url: &str) -> Self {
        let url = Url::parse(base_url)
            .ok()
            .filter(|u| u.has_host())
            .and_then(|u| u.join("/").ok());
        if url.is_none() {
            tracing::debug!(base_url, "Cookie mirror has no origin; cookies disabled");
        }
        Self { jar, url }
    }

    /// A mirror with no origin: reads are empty and writes are dropped.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            jar: Arc::new(Jar::default()),
            url: None,
        }
    }

    /// The underlying jar.
    #[must_use]
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    /// Whether cookies are written with the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.as_ref().is_some_and(|u| u.scheme() == "https")
    }

    /// Read a cookie value, percent-decoded.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let url = self.url.as_ref()?;
        let header = self.jar.cookies(url)?;
        let header = header.to_str().ok()?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| {
                urlencoding::decode(value).map_or_else(|_| value.to_string(), |v| v.into_owned())
            })
    }

    /// `Set-Cookie` value written by [`CookieMirror::set`].
    #[must_use]
    pub fn cookie_string(&self, name: &str, value: &str, max_age_secs: u64) -> String {
        let mut cookie = format!(
            "{name}={}; Path=/; SameSite=Lax; Max-Age={max_age_secs}",
            urlencoding::encode(value)
        );
        if self.is_secure() {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Write a cookie with `Path=/`, `SameSite=Lax` and the given lifetime.
    pub fn set(&self, name: &str, value: &str, max_age_secs: u64) {
        let Some(url) = &self.url else {
            return;
        };
        self.jar
            .add_cookie_str(&self.cookie_string(name, value, max_age_secs), url);
    }

    /// Expire a cookie.
    pub fn remove(&self, name: &str) {
        self.set(name, "", 0);
    }
}
