//! Core types for Skin One.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod stage;
pub mod user;

pub use email::{Email, EmailError};
pub use id::*;
pub use stage::{Stage, StageError};
pub use user::{AdminAllowlist, User};
