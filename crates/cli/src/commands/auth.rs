//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! skinone register -n "Ana Souza" -e ana@hospital.org --coren 123456-SP \
//!     --specialty Estomaterapia --institution "Hospital X"
//! skinone login -e ana@hospital.org
//! skinone whoami --remote
//! skinone logout
//! ```

use secrecy::SecretString;
use serde_json::json;
use skin_one_client::AppContext;
use skin_one_client::models::{LoginRequest, RegisterRequest};
use skin_one_core::Email;

use super::{CliError, print_json};

/// Registration fields as typed on the command line.
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub coren: String,
    pub specialty: String,
    pub institution: String,
}

/// Register and start a session.
pub async fn register(ctx: &AppContext, form: RegisterForm) -> Result<(), CliError> {
    let request = RegisterRequest {
        name: form.name.trim().to_string(),
        email: Email::parse(&form.email)?,
        password: SecretString::from(form.password),
        coren: form.coren.trim().to_string(),
        specialty: form.specialty.trim().to_string(),
        institution: form.institution.trim().to_string(),
    };
    let user = ctx.api().register(&request).await?;
    tracing::info!("Registered {}", user.email);
    print_json(&user)
}

/// Log in and store the session.
pub async fn login(ctx: &AppContext, email: &str, password: String) -> Result<(), CliError> {
    let request = LoginRequest::new(Email::parse(email)?, SecretString::from(password));
    let user = ctx.api().login(&request).await?;
    tracing::info!("Logged in as {}", user.email);
    print_json(&user)
}

pub fn logout(ctx: &AppContext) -> Result<(), CliError> {
    ctx.api().logout()?;
    Ok(())
}

/// Print the current user and whether admin screens are offered.
pub async fn whoami(ctx: &AppContext, remote: bool) -> Result<(), CliError> {
    let user = if remote {
        Some(ctx.api().me().await?)
    } else {
        ctx.session().cached_user()
    };
    let user = user.ok_or(CliError::NotLoggedIn)?;
    print_json(&json!({
        "user": user,
        "is_admin": ctx.api().is_admin(),
    }))
}
