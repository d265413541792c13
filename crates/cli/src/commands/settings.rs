//! Resolved client settings.

use serde_json::json;
use skin_one_client::{AppContext, RunMode};

use super::{CliError, print_json};

/// Print the settings the client resolved at startup, including the Google
/// sign-in entry point when one is configured.
pub fn show(ctx: &AppContext) -> Result<(), CliError> {
    let config = ctx.config();
    let mode = match config.mode {
        RunMode::Development => "development",
        RunMode::Production => "production",
    };
    print_json(&json!({
        "api_base_url": ctx.client().base_url(),
        "mode": mode,
        "google_sign_in": ctx.api().google_sign_in(),
        "auth_bypass": config.auth_bypass_active(),
        "use_mocks": config.use_mocks,
        "request_timeout_secs": config.request_timeout.as_secs_f64(),
        "session_file": config.session_file,
    }))
}
