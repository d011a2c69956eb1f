mod uploadthing;

pub use uploadthing::UploadThingClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Lifetime of every signed access URL handed to browsers
pub const SIGNED_URL_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Error)]
pub enum UploadServiceError {
    #[error("Invalid storage URL: {0}")]
    InvalidStorageUrl(String),
    #[error("Callback signature missing or invalid")]
    InvalidSignature,
    #[error("Backend error: {0}")]
    Backend(String),
}

/// What the browser is about to upload, as declared at initiation.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub file_id: String,
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

/// Where the browser should send the bytes for one ticket.
#[derive(Debug, Clone, Serialize)]
pub struct PresignedUpload {
    pub key: String,
    pub url: String,
}

/// Third-party upload service. Bytes travel from the browser straight to the
/// service; this side only signs URLs and checks the completion callback.
#[async_trait]
pub trait UploadService: Send + Sync {
    /// Mint a short-lived URL the browser can upload the ticket's file to.
    async fn presign_upload(
        &self,
        ticket: &UploadTicket,
    ) -> Result<PresignedUpload, UploadServiceError>;

    /// Check that a completion callback body was signed by the service.
    fn verify_callback(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), UploadServiceError>;

    /// Mint a read URL for `key` valid for `expires_in_seconds`.
    async fn signed_url(
        &self,
        key: &str,
        expires_in_seconds: u64,
    ) -> Result<String, UploadServiceError>;
}

/// Extract the object key from a stored object URL of the form `.../f/{key}[?...]`.
pub fn storage_key_from_url(storage_url: &str) -> Result<String, UploadServiceError> {
    let (_, rest) = storage_url
        .split_once("/f/")
        .ok_or_else(|| UploadServiceError::InvalidStorageUrl(storage_url.to_string()))?;
    let key = rest.split(['?', '#']).next().unwrap_or_default();

    if key.is_empty() {
        return Err(UploadServiceError::InvalidStorageUrl(storage_url.to_string()));
    }
    Ok(key.to_string())
}

/// Signed access URL for a stored object, always valid for [`SIGNED_URL_TTL_SECONDS`].
pub async fn signed_access_url(
    service: &dyn UploadService,
    storage_url: &str,
) -> Result<String, UploadServiceError> {
    let key = storage_key_from_url(storage_url)?;
    service.signed_url(&key, SIGNED_URL_TTL_SECONDS).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_from_url() {
        assert_eq!(
            storage_key_from_url("https://app.ufs.sh/f/abc123").unwrap(),
            "abc123"
        );
        assert_eq!(
            storage_key_from_url("https://utfs.io/f/abc123?foo=bar").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn test_storage_key_from_url_rejects_other_shapes() {
        assert!(matches!(
            storage_key_from_url("https://app.ufs.sh/files/abc"),
            Err(UploadServiceError::InvalidStorageUrl(_))
        ));
        assert!(storage_key_from_url("https://app.ufs.sh/f/").is_err());
        assert!(storage_key_from_url("https://app.ufs.sh/f/?x=1").is_err());
    }
}
