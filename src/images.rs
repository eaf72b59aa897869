//! Image attachment pipeline.

mod imgur;

pub use imgur::ImgurClient;

use crate::error::{AppError, Result};
use async_trait::async_trait;

/// An image received from a client, held in memory.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Raw file bytes.
    pub data: Vec<u8>,
    /// Declared MIME type.
    pub content_type: String,
}

impl ImageUpload {
    /// Create an upload from raw bytes and the declared content type.
    pub fn new(data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the upload carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check size cap, declared type and image signature.
    pub fn validate(&self, max_bytes: usize) -> Result<()> {
        if self.data.len() > max_bytes {
            return Err(AppError::TooLarge(max_bytes));
        }

        if !self.content_type.starts_with("image/") {
            return Err(AppError::Validation(format!(
                "Unsupported content type: {}",
                self.content_type
            )));
        }

        image::guess_format(&self.data)
            .map_err(|_| AppError::Validation("File is not a recognised image".to_string()))?;

        Ok(())
    }
}

/// External service that stores images and hands back a public URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload the image and return its hosted URL.
    async fn upload(&self, image: &ImageUpload) -> Result<String>;
}

/// Validate and upload an image, returning the hosted URL.
///
/// Any failure after validation is reported as [`AppError::Upload`].
pub async fn attach_image(
    host: &dyn ImageHost,
    image: &ImageUpload,
    max_bytes: usize,
) -> Result<String> {
    image.validate(max_bytes)?;

    let url = host.upload(image).await.map_err(|e| match e {
        AppError::Upload(detail) => AppError::Upload(detail),
        other => AppError::Upload(other.to_string()),
    })?;

    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(AppError::Upload(format!(
            "Image host returned an invalid link: {}",
            url
        )));
    }

    tracing::info!(bytes = image.len(), url = %url, "Image uploaded");
    Ok(url)
}
