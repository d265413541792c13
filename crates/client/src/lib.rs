//! Skin One Client - API client for the lesion staging backend.
//!
//! Everything the clinical screens need to talk to the backend, without the
//! screens themselves.
//!
//! # Architecture
//!
//! - [`ApiClient`] builds requests against a fixed base URL, races them
//!   against a timeout, attaches bearer and CSRF headers and turns non-2xx
//!   responses into [`ApiError::Api`]
//! - [`SessionStore`] owns the bearer token (durable storage plus a cookie
//!   mirror) and publishes changes to subscribers
//! - [`CsrfBootstrap`] probes the backend for a CSRF cookie before the first
//!   state-changing request
//! - [`endpoints`] maps logical operations to paths, [`ClientConfig`]
//!   resolves the base URL from the environment
//! - [`SkinOneApi`] exposes the typed operations (login, uploads,
//!   classification, admin metrics) and [`AppContext`] wires it all together
//!   once at startup
//!
//! # Example
//!
//! ```rust,ignore
//! use skin_one_client::{AppContext, ClientConfig, models::LoginRequest};
//!
//! let ctx = AppContext::new(ClientConfig::from_env()?)?;
//! let auth = ctx.api().login(&LoginRequest::new(email, password)).await?;
//! let images = ctx.api().list_images().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod client;
pub mod config;
pub mod context;
pub mod csrf;
pub mod endpoints;
pub mod error;
pub mod mock;
pub mod models;
pub mod payload;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::{GoogleSignIn, SkinOneApi, UploadOutcome};
pub use client::{ApiClient, ResponseBody};
pub use config::{ClientConfig, ConfigError, RunMode};
pub use context::AppContext;
pub use csrf::{CsrfBootstrap, CsrfOutcome};
pub use error::ApiError;
pub use payload::{ImageFile, MultipartForm, Payload, UploadError};
pub use session::{CookieMirror, FileStorage, MemoryStorage, SessionEvent, SessionStore, Storage};
pub use transport::{ApiRequest, RawResponse, RequestBody, ReqwestTransport, Transport};
