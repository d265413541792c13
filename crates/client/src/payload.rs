//! Request payloads: JSON values and multipart image uploads.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::error::ApiError;

/// Per-file upload limit (10 MiB).
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Errors raised while preparing an upload, before any request is made.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A file exceeds [`MAX_IMAGE_BYTES`].
    #[error("{file_name} exceeds 10MB ({size} bytes)")]
    TooLarge { file_name: String, size: u64 },

    /// Every file in the batch was rejected (or the batch was empty).
    #[error("No valid files to upload")]
    NoValidFiles,

    /// A file could not be read from disk.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An image selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    /// Create an image from in-memory bytes, inferring the content type from
    /// the file name.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Read an image from disk.
    ///
    /// The size is checked against the file's metadata first, so an
    /// oversized file is rejected without being read.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::TooLarge` for a file over [`MAX_IMAGE_BYTES`],
    /// or `UploadError::Read` if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let read_error = |source| UploadError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file_name = path
            .file_name()
            .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().into_owned());

        let size = tokio::fs::metadata(path).await.map_err(read_error)?.len();
        if size > MAX_IMAGE_BYTES {
            return Err(UploadError::TooLarge { file_name, size });
        }

        let bytes = tokio::fs::read(path).await.map_err(read_error)?;
        Ok(Self::new(file_name, bytes))
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Reject files above [`MAX_IMAGE_BYTES`].
    ///
    /// # Errors
    ///
    /// Returns `UploadError::TooLarge` when the file is over the limit.
    pub fn check_size(&self) -> Result<(), UploadError> {
        if self.size() > MAX_IMAGE_BYTES {
            return Err(UploadError::TooLarge {
                file_name: self.file_name.clone(),
                size: self.size(),
            });
        }
        Ok(())
    }
}

/// Content type guessed from a file extension.
#[must_use]
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Files that passed the size check and those that did not.
#[derive(Debug, Default)]
pub struct SizeCheck {
    pub accepted: Vec<ImageFile>,
    pub rejected: Vec<UploadError>,
}

impl SizeCheck {
    /// Split a selection into accepted and rejected files.
    #[must_use]
    pub fn run(files: Vec<ImageFile>) -> Self {
        let mut check = Self::default();
        for file in files {
            match file.check_size() {
                Ok(()) => check.accepted.push(file),
                Err(err) => {
                    tracing::debug!(error = %err, "Skipping oversized image");
                    check.rejected.push(err);
                }
            }
        }
        check
    }
}

/// One named part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text { name: String, value: String },
    File { name: String, file: ImageFile },
}

impl FormPart {
    /// Field name of the part.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// Ordered multipart form. Repeated field names are kept in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A form with every file under the same field name.
    #[must_use]
    pub fn with_files(field: &str, files: impl IntoIterator<Item = ImageFile>) -> Self {
        files
            .into_iter()
            .fold(Self::new(), |form, file| form.file(field, file))
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(mut self, name: impl Into<String>, file: ImageFile) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file,
        });
        self
    }

    #[must_use]
    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Files sent under `name`, in order.
    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ImageFile> + 'a {
        self.parts.iter().filter_map(move |part| match part {
            FormPart::File { name: n, file } if n == name => Some(file),
            _ => None,
        })
    }

    /// Convert into a `reqwest` form; reqwest generates the boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if a part's content type is not a valid MIME type.
    pub fn into_reqwest(self) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for part in self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File { name, file } => {
                    let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
                        .file_name(file.file_name)
                        .mime_str(&file.content_type)
                        .map_err(|_| ApiError::InvalidHeader("content-type"))?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

/// Body of a call made through [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// No body supplied by the caller.
    #[default]
    Empty,
    /// A JSON document, sent with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// A multipart form, sent without an explicit content type.
    Multipart(MultipartForm),
}

impl Payload {
    /// Serialize any value into a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Serialize` if the value cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(ApiError::Serialize)
    }

    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

impl From<MultipartForm> for Payload {
    fn from(form: MultipartForm) -> Self {
        Self::Multipart(form)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<()> for Payload {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sized(name: &str, size: usize) -> ImageFile {
        ImageFile::new(name, vec![0_u8; size])
    }

    #[test]
    fn test_content_type_inference() {
        assert_eq!(content_type_for("ferida.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.heic"), "image/heic");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }

    #[test]
    fn test_limit_is_inclusive() {
        let limit = usize::try_from(MAX_IMAGE_BYTES).unwrap();
        assert!(sized("edge.jpg", limit).check_size().is_ok());
        assert!(matches!(
            sized("big.jpg", limit + 1).check_size(),
            Err(UploadError::TooLarge { size, .. }) if size == MAX_IMAGE_BYTES + 1
        ));
    }

    #[test]
    fn test_size_check_partitions() {
        let limit = usize::try_from(MAX_IMAGE_BYTES).unwrap();
        let check = SizeCheck::run(vec![
            sized("a.jpg", 10),
            sized("huge.png", limit + 5),
            sized("b.jpg", 20),
        ]);
        let names: Vec<_> = check.accepted.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg"]);
        assert_eq!(check.rejected.len(), 1);
        assert_eq!(
            check.rejected[0].to_string(),
            format!("huge.png exceeds 10MB ({} bytes)", limit + 5)
        );
    }

    #[test]
    fn test_repeated_fields_keep_order() {
        let form = MultipartForm::with_files("images", [sized("1.jpg", 1), sized("2.jpg", 2)])
            .text("note", "x");
        let names: Vec<_> = form.files_named("images").map(|f| f.file_name.clone()).collect();
        assert_eq!(names, ["1.jpg", "2.jpg"]);
        assert_eq!(form.parts().len(), 3);
        assert_eq!(form.parts()[2].name(), "note");
    }

    #[test]
    fn test_payload_json() {
        #[derive(Serialize)]
        struct Body {
            image_id: &'static str,
        }
        let payload = Payload::json(&Body { image_id: "7" }).unwrap();
        assert_eq!(payload, Payload::Json(serde_json::json!({"image_id": "7"})));
        assert!(!payload.is_multipart());
        assert!(Payload::from(MultipartForm::new()).is_multipart());
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesao.png");
        std::fs::write(&path, b"png-bytes").unwrap();

        let file = ImageFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name, "lesao.png");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.size(), 9);

        let missing = ImageFile::from_path(dir.path().join("nope.png")).await;
        assert!(matches!(missing, Err(UploadError::Read { .. })));
    }

    #[tokio::test]
    async fn test_from_path_rejects_oversized_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enorme.jpg");
        // Sparse: the length is set without writing any data
        std::fs::File::create(&path)
            .unwrap()
            .set_len(MAX_IMAGE_BYTES + 1)
            .unwrap();

        let err = ImageFile::from_path(&path).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::TooLarge { ref file_name, size }
                if file_name == "enorme.jpg" && size == MAX_IMAGE_BYTES + 1
        ));
    }

    #[test]
    fn test_into_reqwest() {
        let form = MultipartForm::with_files("images", [sized("1.jpg", 3)]);
        assert!(form.into_reqwest().is_ok());
    }
}
