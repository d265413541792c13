//! Typed operations on the Skin One backend.

use skin_one_core::{Stage, User};
use tracing::instrument;

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::ApiError;
use crate::mock;
use crate::models::{
    AdminMetrics, AuthResponse, ClassifyRequest, ClassifyResponse, ImageItem, LoginRequest,
    MetricsQuery, RegisterRequest, UploadBatchWithStageResponse, UploadResponse,
    UploadSingleResponse, UsersQuery,
};
use crate::payload::{ImageFile, MultipartForm, Payload, SizeCheck, UploadError};
use crate::session::SessionStore;

/// Multipart field for batch uploads (repeated once per file).
const BATCH_FIELD: &str = "images";

/// Multipart field for single uploads.
const SINGLE_FIELD: &str = "image";

/// Result of a batch upload together with the files left out of it.
#[derive(Debug)]
pub struct UploadOutcome<T> {
    pub response: T,
    /// Files rejected before sending, in selection order.
    pub skipped: Vec<UploadError>,
}

/// Where and how to start a Google sign-in.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GoogleSignIn {
    pub client_id: String,
    /// Absolute URL of the backend's Google sign-in endpoint
    pub url: String,
}

/// Backend operations for the clinical workflow.
#[derive(Debug, Clone)]
pub struct SkinOneApi {
    client: ApiClient,
    config: ClientConfig,
}

impl SkinOneApi {
    #[must_use]
    pub const fn new(client: ApiClient, config: ClientConfig) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        self.client.session()
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Create an account and start a session for it.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the session cannot be saved.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let auth: AuthResponse = self
            .client
            .post_json(endpoints::auth::register(), request)
            .await?;
        self.start_session(auth)
    }

    /// Log in and store the returned token and user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the session cannot be saved.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<User, ApiError> {
        let auth: AuthResponse = self
            .client
            .post_json(endpoints::auth::login(), request)
            .await?;
        self.start_session(auth)
    }

    /// Fetch the current user and refresh the cached copy.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    pub async fn me(&self) -> Result<User, ApiError> {
        let user: User = self.client.get(endpoints::auth::me()).await?;
        self.session().set_user(&user)?;
        Ok(user)
    }

    /// End the local session. The backend is not contacted.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` if the session cannot be cleared.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.session().logout()?;
        tracing::info!("Logged out");
        Ok(())
    }

    fn start_session(&self, auth: AuthResponse) -> Result<User, ApiError> {
        self.session().set_token(&auth.token)?;
        self.session().set_user(&auth.user)?;
        tracing::info!(user_id = %auth.user.id, "Session started");
        Ok(auth.user)
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Upload a batch of images.
    ///
    /// Files over the size limit are skipped and reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::NoValidFiles` (before any request) when nothing
    /// is left to send, or `ApiError` if the request fails.
    pub async fn upload_batch(
        &self,
        files: Vec<ImageFile>,
    ) -> Result<UploadOutcome<UploadResponse>, ApiError> {
        let (form, skipped) = batch_form(files)?;
        let response = self.client.post(endpoints::images::upload(), form).await?;
        Ok(UploadOutcome { response, skipped })
    }

    /// Upload one image.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::TooLarge` (before any request) for an oversized
    /// file, or `ApiError` if the request fails.
    pub async fn upload_single(&self, file: ImageFile) -> Result<UploadSingleResponse, ApiError> {
        file.check_size()?;
        let form = MultipartForm::new().file(SINGLE_FIELD, file);
        self.client
            .post(endpoints::images::upload_single(), form)
            .await
    }

    /// Upload a batch of images already classified as `stage`.
    ///
    /// # Errors
    ///
    /// Same as [`SkinOneApi::upload_batch`].
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn upload_batch_with_stage(
        &self,
        stage: Stage,
        files: Vec<ImageFile>,
    ) -> Result<UploadOutcome<UploadBatchWithStageResponse>, ApiError> {
        let (form, skipped) = batch_form(files)?;
        let response = self
            .client
            .post(&endpoints::images::upload_with_stage(stage), form)
            .await?;
        Ok(UploadOutcome { response, skipped })
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    pub async fn list_images(&self) -> Result<Vec<ImageItem>, ApiError> {
        self.client.get(endpoints::images::list()).await
    }

    // =========================================================================
    // Classifications
    // =========================================================================

    /// Record a stage for an uploaded image.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, request), fields(image_id = %request.image_id, stage = %request.stage))]
    pub async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, ApiError> {
        self.client
            .post(endpoints::classifications::create(), Payload::json(request)?)
            .await
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Dashboard metrics. With mock data enabled no request is made.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    pub async fn admin_metrics(&self, query: &MetricsQuery) -> Result<AdminMetrics, ApiError> {
        if self.config.use_mocks {
            tracing::debug!("Serving sample admin metrics");
            return Ok(mock::sample_metrics(chrono::Utc::now()));
        }
        self.client.get(&endpoints::admin::metrics(query)).await
    }

    /// User listing. The body shape is backend-defined and returned as is.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    pub async fn admin_users(&self, query: &UsersQuery) -> Result<serde_json::Value, ApiError> {
        self.client.get(&endpoints::admin::users(query)).await
    }

    /// Google sign-in details, when a Google client id is configured.
    #[must_use]
    pub fn google_sign_in(&self) -> Option<GoogleSignIn> {
        let client_id = self.config.google_client_id.clone()?;
        Some(GoogleSignIn {
            client_id,
            url: self.client.url_for(endpoints::auth::login_with_google()),
        })
    }

    /// Whether to offer admin screens to the cached user.
    ///
    /// Decided locally from the cached user and the configured allowlist.
    /// The backend is the authority on admin access.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        if self.config.auth_bypass_active() {
            return true;
        }
        self.session()
            .cached_user()
            .is_some_and(|user| self.config.admin_emails.is_admin(&user))
    }
}

/// Size-check `files` and build the batch form from the ones that pass.
fn batch_form(files: Vec<ImageFile>) -> Result<(MultipartForm, Vec<UploadError>), UploadError> {
    let SizeCheck { accepted, rejected } = SizeCheck::run(files);
    if accepted.is_empty() {
        return Err(UploadError::NoValidFiles);
    }
    Ok((MultipartForm::with_files(BATCH_FIELD, accepted), rejected))
}
