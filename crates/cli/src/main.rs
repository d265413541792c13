//! Skin One CLI - Command-line front end for the staging workflow.
//!
//! # Usage
//!
//! ```bash
//! # Log in (password from --password or SKINONE_PASSWORD)
//! skinone login -e enfermeira@hospital.org
//!
//! # Upload a batch already classified as stage 2
//! skinone upload lesao1.jpg lesao2.jpg --stage estagio2
//!
//! # Record a classification
//! skinone classify --image 42 --stage estagio3 --observations "bordas irregulares"
//!
//! # Dashboard metrics for March, users filtered and exported as CSV
//! skinone admin metrics --from 2024-03-01 --to 2024-03-31 --search dra --csv
//! ```
//!
//! # Commands
//!
//! - `register`, `login`, `logout`, `whoami` - Session management
//! - `upload`, `images` - Image upload and listing
//! - `classify` - Record a stage for an image
//! - `admin metrics`, `admin users` - Admin dashboard data
//! - `config` - Resolved settings, including Google sign-in

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use skin_one_client::{AppContext, ClientConfig};
use skin_one_core::Stage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "skinone")]
#[command(author, version, about = "Skin One pressure-injury staging client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(long, env = "SKINONE_PASSWORD", hide_env_values = true)]
        password: String,

        /// Nursing council registration number
        #[arg(long)]
        coren: String,

        #[arg(long)]
        specialty: String,

        #[arg(long)]
        institution: String,
    },
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(long, env = "SKINONE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Clear the stored session
    Logout,
    /// Show the logged-in user
    Whoami {
        /// Ask the backend instead of reading the cached user
        #[arg(long)]
        remote: bool,
    },
    /// Upload images
    Upload {
        /// Image files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Classify every uploaded image with this stage
        #[arg(long)]
        stage: Option<Stage>,

        /// Upload a single image
        #[arg(long, conflicts_with = "stage")]
        single: bool,
    },
    /// List uploaded images
    Images,
    /// Record a stage for an image
    Classify {
        #[arg(long)]
        image: String,

        #[arg(long)]
        stage: Stage,

        #[arg(long)]
        observations: Option<String>,
    },
    /// Show the resolved client settings
    Config,
    /// Admin dashboard data
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Classification metrics
    Metrics {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Only users whose name or email contains this text
        #[arg(long)]
        search: Option<String>,

        /// Print per-user counts as CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },
    /// Search users
    Users {
        #[arg(long)]
        q: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,
    },
}

/// Initialize Sentry when `SKINONE_SENTRY_DSN` is set.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SKINONE_SENTRY_DSN").ok().filter(|d| !d.is_empty())?;
    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    Some(guard)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let _sentry_guard = init_sentry();

    // Logs go to stderr so stdout stays machine-readable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "skin_one_cli=info,skin_one_client=info".into());
    let json_logs = std::env::var("SKINONE_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ClientConfig::from_env()?;
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
            coren,
            specialty,
            institution,
        } => {
            let form = commands::auth::RegisterForm {
                name,
                email,
                password,
                coren,
                specialty,
                institution,
            };
            commands::auth::register(&ctx, form).await?;
        }
        Commands::Login { email, password } => {
            commands::auth::login(&ctx, &email, password).await?;
        }
        Commands::Logout => commands::auth::logout(&ctx)?,
        Commands::Whoami { remote } => commands::auth::whoami(&ctx, remote).await?,
        Commands::Upload {
            files,
            stage,
            single,
        } => commands::images::upload(&ctx, &files, stage, single).await?,
        Commands::Images => commands::images::list(&ctx).await?,
        Commands::Config => commands::settings::show(&ctx)?,
        Commands::Classify {
            image,
            stage,
            observations,
        } => commands::classify::classify(&ctx, image, stage, observations).await?,
        Commands::Admin { action } => match action {
            AdminAction::Metrics {
                from,
                to,
                search,
                csv,
            } => commands::admin::metrics(&ctx, from, to, search.as_deref(), csv).await?,
            AdminAction::Users { q, limit, offset } => {
                commands::admin::users(&ctx, q, limit, offset).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_single_conflicts_with_stage() {
        let parsed = Cli::try_parse_from([
            "skinone", "upload", "a.jpg", "--single", "--stage", "estagio1",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_stage_and_dates_parse() {
        let cli = Cli::try_parse_from(["skinone", "upload", "a.jpg", "b.jpg", "--stage", "DTPI"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Upload { stage: Some(Stage::Dtpi), ref files, .. } if files.len() == 2
        ));

        let cli = Cli::try_parse_from(["skinone", "admin", "metrics", "--from", "2024-03-01"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Admin {
                action: AdminAction::Metrics { from: Some(_), to: None, csv: false, .. }
            }
        ));

        assert!(Cli::try_parse_from(["skinone", "classify", "--image", "1", "--stage", "x"]).is_err());
        assert!(matches!(
            Cli::try_parse_from(["skinone", "config"]).map(|c| c.command),
            Ok(Commands::Config)
        ));
    }
}
