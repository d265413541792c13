//! Command implementations.

pub mod admin;
pub mod auth;
pub mod classify;
pub mod images;
pub mod settings;

use serde::Serialize;
use skin_one_client::{ApiError, ConfigError, UploadError};
use skin_one_core::EmailError;
use thiserror::Error;

/// Errors that can end a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("--single takes exactly one file, got {0}")]
    SingleNeedsOneFile(usize),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Write `value` to stdout as pretty JSON.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Write raw text to stdout.
#[allow(clippy::print_stdout)]
pub fn print_text(text: &str) {
    println!("{text}");
}
