//! The session store.

use std::sync::{Arc, Mutex};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use skin_one_core::User;
use tokio::sync::broadcast;

use super::cookies::CookieMirror;
use super::storage::{Storage, StorageError};
use super::{TOKEN_COOKIE_MAX_AGE, keys};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 16;

/// A change to the session token.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    TokenSet(SecretString),
    TokenCleared,
}

impl SessionEvent {
    /// Storage key the event refers to.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        keys::TOKEN
    }

    /// The new token, or `None` when it was cleared.
    #[must_use]
    pub const fn new_value(&self) -> Option<&SecretString> {
        match self {
            Self::TokenSet(token) => Some(token),
            Self::TokenCleared => None,
        }
    }
}

/// Owns the bearer token and the cached user record.
///
/// The token lives in durable storage with a cookie copy; both are only
/// written here. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    storage: Arc<dyn Storage>,
    cookies: CookieMirror,
    events: broadcast::Sender<SessionEvent>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("cookies", &self.inner.cookies)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, cookies: CookieMirror) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionStoreInner {
                storage,
                cookies,
                events,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// The cookie mirror this store writes through.
    #[must_use]
    pub fn cookies(&self) -> &CookieMirror {
        &self.inner.cookies
    }

    /// Subscribe to token changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Current token: durable storage first, then the cookie.
    ///
    /// Storage failures and empty values read as no token.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        let stored = match self.inner.storage.get(keys::TOKEN) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session token");
                None
            }
        };
        stored
            .filter(|t| !t.is_empty())
            .or_else(|| self.inner.cookies.get(keys::TOKEN).filter(|t| !t.is_empty()))
            .map(SecretString::from)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Store a token and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if durable storage cannot be written.
    pub fn set_token(&self, token: &SecretString) -> Result<(), StorageError> {
        {
            let _guard = self.inner.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
            self.inner.storage.set(keys::TOKEN, token.expose_secret())?;
            self.inner
                .cookies
                .set(keys::TOKEN, token.expose_secret(), TOKEN_COOKIE_MAX_AGE);
        }
        tracing::debug!("Session token stored");
        self.notify(SessionEvent::TokenSet(token.clone()));
        Ok(())
    }

    /// Remove the token and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if durable storage cannot be written.
    pub fn clear_token(&self) -> Result<(), StorageError> {
        {
            let _guard = self.inner.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
            // Cookie goes only once storage no longer holds the token
            self.inner.storage.remove(keys::TOKEN)?;
            self.inner.cookies.remove(keys::TOKEN);
        }
        tracing::debug!("Session token cleared");
        self.notify(SessionEvent::TokenCleared);
        Ok(())
    }

    /// `Authorization: Bearer <token>` when a token is present, otherwise an
    /// empty map.
    #[must_use]
    pub fn auth_header(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Some(token) = self.token() else {
            return headers;
        };
        match HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("Session token is not a valid header value; sending none"),
        }
        headers
    }

    /// Cache the user record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if durable storage cannot be written.
    pub fn set_user(&self, user: &User) -> Result<(), StorageError> {
        let json = serde_json::to_string(user).map_err(|source| StorageError::Corrupt {
            path: keys::USER.into(),
            source,
        })?;
        let _guard = self.inner.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        self.inner.storage.set(keys::USER, &json)
    }

    /// The cached user, if one is stored and parses.
    ///
    /// Older clients stored a bare marker string under the same key; that
    /// reads as no user.
    #[must_use]
    pub fn cached_user(&self) -> Option<User> {
        let raw = match self.inner.storage.get(keys::USER) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cached user");
                return None;
            }
        };
        serde_json::from_str(&raw).ok()
    }

    /// # Errors
    ///
    /// Returns `StorageError` if durable storage cannot be written.
    pub fn clear_user(&self) -> Result<(), StorageError> {
        let _guard = self.inner.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        self.inner.storage.remove(keys::USER)
    }

    /// Drop the token and the cached user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if durable storage cannot be written.
    pub fn logout(&self) -> Result<(), StorageError> {
        self.clear_token()?;
        self.clear_user()
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}
