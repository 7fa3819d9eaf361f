//! Image Repository
//!
//! Object storage for catalog and admin-uploaded images is an external
//! collaborator specified only by interface (SPEC_FULL §1, §6.4): a single
//! `upload` call taking raw bytes and a content type, returning a public
//! URL. Grounded on the same narrow-trait-behind-I/O idiom as
//! `payment::PaymentGateway` and `email::EmailService` — callers never see
//! a concrete object-store client, only this trait.

use async_trait::async_trait;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("storage provider error: {0}")]
    Provider(String),
}

/// Content types the catalog/admin image upload endpoints accept.
pub const SUPPORTED_IMAGE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str, key: &str) -> Result<String, StorageError>;
}

/// Test/dev double: doesn't write anywhere, just derives a deterministic
/// URL under the configured public asset base.
pub struct MockImageRepository {
    base_url: String,
}

impl MockImageRepository {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl ImageRepository for MockImageRepository {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str, key: &str) -> Result<String, StorageError> {
        if !SUPPORTED_IMAGE_CONTENT_TYPES.contains(&content_type) {
            return Err(StorageError::UnsupportedFormat(content_type.to_string()));
        }
        tracing::info!(key, content_type, bytes = bytes.len(), "image stored");
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_rejects_unsupported_format() {
        let repo = MockImageRepository::new("https://assets.example.com".to_string());
        let result = repo.upload(vec![1, 2, 3], "application/pdf", "img.pdf").await;
        assert!(matches!(result, Err(StorageError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_upload_returns_url_under_base() {
        let repo = MockImageRepository::new("https://assets.example.com".to_string());
        let url = repo.upload(vec![1, 2, 3], "image/png", "products/abc.png").await.unwrap();
        assert_eq!(url, "https://assets.example.com/products/abc.png");
    }
}
