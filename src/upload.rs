//! Image upload handling
//!
//! Validation happens here, before a session ever sees the file: the MIME
//! type guessed from the file name must be `image/*` and the file must be
//! at most 10 MiB.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::errors::UploadError;

/// Largest accepted upload in bytes (10 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// How the preview reference stored in history is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewMode {
    /// `file://` URL of the canonical source path
    #[default]
    FileUrl,
    /// Self-contained `data:` URL holding the base64 image
    DataUrl,
}

/// A validated image plus its preview reference.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    filename: String,
    mime: String,
    data: Bytes,
    preview_url: String,
}

impl ImageUpload {
    /// Validate and read an image from disk.
    pub async fn load(path: &Path, preview: PreviewMode) -> Result<Self, UploadError> {
        let read_error = |source| UploadError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mime = guess_mime(path);
        let metadata = tokio::fs::metadata(path).await.map_err(read_error)?;
        validate(path, &mime, metadata.len())?;

        let data = Bytes::from(tokio::fs::read(path).await.map_err(read_error)?);
        // The file may have grown between the two calls
        validate(path, &mime, data.len() as u64)?;

        let preview_url = match preview {
            PreviewMode::DataUrl => data_url(&mime, &data),
            PreviewMode::FileUrl => {
                let canonical = tokio::fs::canonicalize(path).await.map_err(read_error)?;
                format!("file://{}", canonical.display())
            }
        };

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        log::debug!("Loaded {} ({}, {} bytes)", filename, mime, data.len());

        Ok(Self {
            filename,
            mime,
            data,
            preview_url,
        })
    }

    /// Validate an in-memory image; the preview is always a `data:` URL.
    pub fn from_bytes(
        filename: impl Into<String>,
        mime: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Result<Self, UploadError> {
        let filename = filename.into();
        let mime = mime.into();
        let data = data.into();
        validate(Path::new(&filename), &mime, data.len() as u64)?;

        let preview_url = data_url(&mime, &data);
        Ok(Self {
            filename,
            mime,
            data,
            preview_url,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Raw image bytes; cloning is cheap
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn preview_url(&self) -> &str {
        &self.preview_url
    }
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn validate(path: &Path, mime: &str, size: u64) -> Result<(), UploadError> {
    if !mime.starts_with("image/") {
        return Err(UploadError::UnsupportedType {
            path: PathBuf::from(path),
            mime: mime.to_string(),
        });
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            path: PathBuf::from(path),
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

fn data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}
