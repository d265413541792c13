//! Session state: bearer token, cached user and their persistence.
//!
//! [`SessionStore`] is the only writer of the durable keys and of the token
//! cookie; everything else reads through it.

mod cookies;
mod storage;
mod store;

pub use cookies::CookieMirror;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use store::{SessionEvent, SessionStore};

/// Durable storage keys. The token cookie uses the same name as its key.
pub mod keys {
    /// Key holding the bearer token.
    pub const TOKEN: &str = "skinone-token";

    /// Key holding the cached user record as JSON.
    pub const USER: &str = "skinone-user";
}

/// Token cookie lifetime in seconds (30 days).
pub const TOKEN_COOKIE_MAX_AGE: u64 = 30 * 24 * 60 * 60;
