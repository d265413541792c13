//! Admin dashboard commands.
//!
//! The admin check here only decides whether to warn; the backend decides
//! whether the data is returned.
//!
//! # Environment Variables
//!
//! - `SKINONE_ADMIN_EMAILS` - Comma-separated admin allowlist
//! - `SKINONE_USE_MOCKS` - Print sample metrics without contacting the backend

use chrono::NaiveDate;
use serde_json::json;
use skin_one_client::AppContext;
use skin_one_client::models::{MetricsQuery, UsersQuery, users_csv};

use super::{CliError, print_json, print_text};

fn warn_if_not_admin(ctx: &AppContext) {
    if !ctx.api().is_admin() {
        tracing::warn!("Current user is not on the admin allowlist; the backend may refuse");
    }
}

/// Print dashboard metrics, optionally filtering the per-user table.
pub async fn metrics(
    ctx: &AppContext,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    search: Option<&str>,
    csv: bool,
) -> Result<(), CliError> {
    warn_if_not_admin(ctx);
    let metrics = ctx.api().admin_metrics(&MetricsQuery { from, to }).await?;
    let users = metrics.users_matching(search.unwrap_or_default());

    if csv {
        print_text(&users_csv(users));
        return Ok(());
    }
    if search.is_some() {
        return print_json(&json!({
            "metrics": &metrics,
            "matching_users": users,
        }));
    }
    print_json(&metrics)
}

pub async fn users(
    ctx: &AppContext,
    q: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
) -> Result<(), CliError> {
    warn_if_not_admin(ctx);
    let body = ctx.api().admin_users(&UsersQuery { q, limit, offset }).await?;
    print_json(&body)
}
