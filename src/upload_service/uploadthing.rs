use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use ring::hmac;

use super::{PresignedUpload, UploadService, UploadServiceError, UploadTicket};
use crate::config::UploadConfig;

/// Prefix used on every signature this service produces or expects
const SIGNATURE_PREFIX: &str = "hmac-sha256=";

/// Ingest URLs only need to outlive the browser's upload
const INGEST_URL_TTL_SECONDS: i64 = 3600;

/// UploadThing-style client. URLs are signed locally with the app secret;
/// no network round-trip is needed.
pub struct UploadThingClient {
    app_id: String,
    file_host: String,
    ingest_url: String,
    key: hmac::Key,
}

impl UploadThingClient {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            app_id: config.app_id.clone(),
            file_host: config.file_host.clone(),
            ingest_url: config.ingest_url.clone(),
            key: hmac::Key::new(hmac::HMAC_SHA256, config.secret.as_bytes()),
        }
    }

    fn sign(&self, data: &[u8]) -> String {
        let tag = hmac::sign(&self.key, data);
        format!("{SIGNATURE_PREFIX}{}", hex::encode(tag.as_ref()))
    }

    /// Append a signature over the full URL as its final query parameter.
    fn sign_url(&self, url: Url) -> String {
        let unsigned = String::from(url);
        let signature = self.sign(unsigned.as_bytes());
        format!("{unsigned}&signature={signature}")
    }

    /// Signed read URL for `key` expiring at `expires_at_ms` (unix millis).
    pub fn read_url_at(&self, key: &str, expires_at_ms: i64) -> Result<String, UploadServiceError> {
        let url = Url::parse_with_params(
            &format!("{}/f/{key}", self.file_host),
            &[("expires", expires_at_ms.to_string())],
        )
        .map_err(|e| UploadServiceError::Backend(e.to_string()))?;
        Ok(self.sign_url(url))
    }

    /// Canonical object URL reported by the service after upload.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/f/{key}", self.file_host)
    }
}

#[async_trait]
impl UploadService for UploadThingClient {
    async fn presign_upload(
        &self,
        ticket: &UploadTicket,
    ) -> Result<PresignedUpload, UploadServiceError> {
        let key = ticket.file_id.clone();
        let expires = Utc::now().timestamp_millis() + INGEST_URL_TTL_SECONDS * 1000;

        let url = Url::parse_with_params(
            &format!("{}/{key}", self.ingest_url),
            &[
                ("expires", expires.to_string()),
                ("x-ut-identifier", self.app_id.clone()),
                ("x-ut-file-name", ticket.name.clone()),
                ("x-ut-file-size", ticket.size.to_string()),
                ("x-ut-file-type", ticket.content_type.clone()),
                ("x-ut-content-disposition", "inline".to_string()),
            ],
        )
        .map_err(|e| UploadServiceError::Backend(e.to_string()))?;

        Ok(PresignedUpload {
            key,
            url: self.sign_url(url),
        })
    }

    fn verify_callback(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), UploadServiceError> {
        let tag = signature
            .and_then(|s| s.strip_prefix(SIGNATURE_PREFIX))
            .and_then(|hex_tag| hex::decode(hex_tag).ok())
            .ok_or(UploadServiceError::InvalidSignature)?;

        hmac::verify(&self.key, body, &tag).map_err(|_| UploadServiceError::InvalidSignature)
    }

    async fn signed_url(
        &self,
        key: &str,
        expires_in_seconds: u64,
    ) -> Result<String, UploadServiceError> {
        let ttl_ms = i64::try_from(expires_in_seconds)
            .ok()
            .and_then(|s| s.checked_mul(1000))
            .ok_or_else(|| UploadServiceError::Backend("expiry out of range".to_string()))?;
        self.read_url_at(key, Utc::now().timestamp_millis() + ttl_ms)
    }
}
