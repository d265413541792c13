//! Skin One Core - Shared domain types.
//!
//! This crate provides the types shared by every Skin One component:
//! - `client` - API client, session store and typed operations
//! - `cli` - Command-line front end for the clinical workflow
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, lesion stages and user records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
