//! Request and response bodies for the backend endpoints.
//!
//! Unknown fields in responses are ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use skin_one_core::{ClassificationId, Email, ImageId, Stage, UploadBatchId, User, UserId};

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: Email,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
}

impl LoginRequest {
    #[must_use]
    pub const fn new(email: Email, password: SecretString) -> Self {
        Self { email, password }
    }
}

/// New professional account.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: Email,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
    /// Nursing council registration number
    pub coren: String,
    pub specialty: String,
    pub institution: String,
}

/// Returned by login and register.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: SecretString,
    pub user: User,
}

// =============================================================================
// Images
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub uploaded: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub id: ImageId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSingleResponse {
    pub image: UploadedImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBatchWithStageResponse {
    pub upload_batch_id: UploadBatchId,
    pub uploaded: u64,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    pub id: ImageId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
}

// =============================================================================
// Classifications
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifyRequest {
    pub image_id: ImageId,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub id: ClassificationId,
    pub image_id: ImageId,
    /// Kept as sent; the backend may echo labels outside [`Stage`].
    pub stage: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub classification_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminMetrics {
    pub total_users: u64,
    pub total_images: u64,
    pub classified_images_count: u64,
    pub unclassified_images_count: u64,
    /// Classification count keyed by stage identifier
    pub classifications_per_category: BTreeMap<String, u64>,
    pub classifications_by_user: Vec<AdminUserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_classifications: Option<Vec<DailyCount>>,
}

impl AdminMetrics {
    /// Users whose name or email contains `query`, ignoring case. A blank
    /// query matches everyone.
    #[must_use]
    pub fn users_matching(&self, query: &str) -> Vec<&AdminUserSummary> {
        let query = query.trim().to_lowercase();
        self.classifications_by_user
            .iter()
            .filter(|u| {
                query.is_empty()
                    || u.name.to_lowercase().contains(&query)
                    || u.email.to_lowercase().contains(&query)
            })
            .collect()
    }
}

/// Render user summaries as CSV with every field quoted.
#[must_use]
pub fn users_csv<'a>(users: impl IntoIterator<Item = &'a AdminUserSummary>) -> String {
    fn quote(value: &str) -> String {
        format!("\"{}\"", value.replace('"', "\"\""))
    }

    let header = ["id", "name", "email", "classification_count", "last_active"];
    let mut lines = vec![header.map(quote).join(",")];
    for user in users {
        let last_active = user.last_active.map(|t| t.to_rfc3339()).unwrap_or_default();
        let row = [
            user.id.as_str(),
            user.name.as_str(),
            user.email.as_str(),
            &user.classification_count.to_string(),
            &last_active,
        ];
        lines.push(row.map(quote).join(","));
    }
    lines.join("\n")
}

/// Date range for [`AdminMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Search and paging for the admin user listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
