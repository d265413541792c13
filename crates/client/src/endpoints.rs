//! Endpoint registry.
//!
//! Pure functions from a logical operation to a path relative to the API base
//! URL, query string included. Query parameters that are absent are left out
//! and every value is percent-encoded.

use skin_one_core::Stage;

use crate::models::{MetricsQuery, UsersQuery};

/// Append `?a=1&b=2` to `path` when there are parameters.
fn with_query(path: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{query}")
}

pub mod auth {
    #[must_use]
    pub const fn register() -> &'static str {
        "/auth/register/"
    }

    #[must_use]
    pub const fn login() -> &'static str {
        "/auth/login/"
    }

    /// Google sign-in. Kept for screens that still link it; the backend may
    /// treat it as a no-op.
    #[must_use]
    pub const fn login_with_google() -> &'static str {
        "/auth/google/"
    }

    /// Current user. Also the fallback CSRF probe.
    #[must_use]
    pub const fn me() -> &'static str {
        "/auth/me/"
    }

    /// Sets the CSRF cookie.
    #[must_use]
    pub const fn csrf() -> &'static str {
        "/auth/csrf/"
    }
}

pub mod images {
    use super::Stage;

    /// Batch upload, multipart field `images` repeated.
    #[must_use]
    pub const fn upload() -> &'static str {
        "/images/upload/"
    }

    /// Single upload, multipart field `image`.
    #[must_use]
    pub const fn upload_single() -> &'static str {
        "/images/upload/single/"
    }

    /// Batch upload that classifies every image with `stage`.
    #[must_use]
    pub fn upload_with_stage(stage: Stage) -> String {
        format!(
            "/images/upload/with-stage/?stage={}",
            urlencoding::encode(stage.as_str())
        )
    }

    #[must_use]
    pub const fn list() -> &'static str {
        "/images/"
    }
}

pub mod classifications {
    #[must_use]
    pub const fn create() -> &'static str {
        "/classifications/"
    }
}

pub mod admin {
    use super::{MetricsQuery, UsersQuery, with_query};

    /// Dashboard metrics, optionally limited to a date range.
    #[must_use]
    pub fn metrics(query: &MetricsQuery) -> String {
        let mut params = Vec::new();
        if let Some(from) = query.from {
            params.push(("from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = query.to {
            params.push(("to", to.format("%Y-%m-%d").to_string()));
        }
        with_query("/admin/metrics/", &params)
    }

    /// User listing with search and paging.
    #[must_use]
    pub fn users(query: &UsersQuery) -> String {
        let mut params = Vec::new();
        if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
            params.push(("q", q.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = query.offset {
            params.push(("offset", offset.to_string()));
        }
        with_query("/admin/users/", &params)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_fixed_paths() {
        assert_eq!(auth::register(), "/auth/register/");
        assert_eq!(auth::login(), "/auth/login/");
        assert_eq!(auth::login_with_google(), "/auth/google/");
        assert_eq!(auth::me(), "/auth/me/");
        assert_eq!(auth::csrf(), "/auth/csrf/");
        assert_eq!(images::upload(), "/images/upload/");
        assert_eq!(images::upload_single(), "/images/upload/single/");
        assert_eq!(images::list(), "/images/");
        assert_eq!(classifications::create(), "/classifications/");
    }

    #[test]
    fn test_upload_with_stage() {
        assert_eq!(
            images::upload_with_stage(Stage::Estagio2),
            "/images/upload/with-stage/?stage=estagio2"
        );
        assert_eq!(
            images::upload_with_stage(Stage::NaoClassificavel),
            "/images/upload/with-stage/?stage=nao_classificavel"
        );
    }

    #[test]
    fn test_metrics_query() {
        assert_eq!(admin::metrics(&MetricsQuery::default()), "/admin/metrics/");
        let query = MetricsQuery {
            from: NaiveDate::from_ymd_opt(2024, 3, 1),
            to: NaiveDate::from_ymd_opt(2024, 3, 31),
        };
        assert_eq!(
            admin::metrics(&query),
            "/admin/metrics/?from=2024-03-01&to=2024-03-31"
        );
        let only_to = MetricsQuery {
            from: None,
            to: NaiveDate::from_ymd_opt(2024, 1, 9),
        };
        assert_eq!(admin::metrics(&only_to), "/admin/metrics/?to=2024-01-09");
    }

    #[test]
    fn test_users_query() {
        assert_eq!(admin::users(&UsersQuery::default()), "/admin/users/");
        let query = UsersQuery {
            q: Some("Dra. C&D".to_string()),
            limit: Some(20),
            offset: Some(0),
        };
        assert_eq!(
            admin::users(&query),
            "/admin/users/?q=Dra.%20C%26D&limit=20&offset=0"
        );
        let blank = UsersQuery {
            q: Some(String::new()),
            limit: None,
            offset: Some(40),
        };
        assert_eq!(admin::users(&blank), "/admin/users/?offset=40");
    }
}
