use std::sync::Mutex;

use async_trait::async_trait;
use filebox::upload_service::{
    signed_access_url, PresignedUpload, UploadService, UploadServiceError, UploadThingClient,
    UploadTicket, SIGNED_URL_TTL_SECONDS,
};

/// Records every signed URL request it receives.
#[derive(Default)]
struct RecordingService {
    requests: Mutex<Vec<(String, u64)>>,
}

#[async_trait]
impl UploadService for RecordingService {
    async fn presign_upload(
        &self,
        ticket: &UploadTicket,
    ) -> Result<PresignedUpload, UploadServiceError> {
        Ok(PresignedUpload {
            key: ticket.file_id.clone(),
            url: format!("https://ingest.test/{}", ticket.file_id),
        })
    }

    fn verify_callback(
        &self,
        _body: &[u8],
        _signature: Option<&str>,
    ) -> Result<(), UploadServiceError> {
        Ok(())
    }

    async fn signed_url(
        &self,
        key: &str,
        expires_in_seconds: u64,
    ) -> Result<String, UploadServiceError> {
        self.requests
            .lock()
            .unwrap()
            .push((key.to_string(), expires_in_seconds));
        Ok(format!("https://signed.test/{key}"))
    }
}

#[tokio::test]
async fn test_signed_access_url_always_requests_one_hour() {
    let service = RecordingService::default();

    signed_access_url(&service, "https://app.ufs.sh/f/key-a")
        .await
        .unwrap();
    signed_access_url(&service, "https://utfs.io/f/key-b?x=1")
        .await
        .unwrap();

    let requests = service.requests.lock().unwrap().clone();
    assert_eq!(SIGNED_URL_TTL_SECONDS, 3600);
    assert_eq!(
        requests,
        vec![("key-a".to_string(), 3600), ("key-b".to_string(), 3600)]
    );
}

#[tokio::test]
async fn test_signed_access_url_rejects_malformed_storage_url() {
    let service = RecordingService::default();

    let result = signed_access_url(&service, "https://elsewhere.test/objects/key").await;
    assert!(matches!(
        result,
        Err(UploadServiceError::InvalidStorageUrl(_))
    ));
    assert!(service.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_same_storage_url_gives_same_key() {
    let service = RecordingService::default();
    let url = "https://app.ufs.sh/f/stable-key";

    let a = signed_access_url(&service, url).await.unwrap();
    let b = signed_access_url(&service, url).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_uploadthing_signed_url_points_at_object_key() {
    let config = filebox::testutil::test_config(std::path::Path::new("unused"));
    let client = UploadThingClient::new(&config.uploads);

    let storage_url = client.object_url("abc123");
    let signed = signed_access_url(&client, &storage_url).await.unwrap();

    assert!(signed.starts_with(&format!("{storage_url}?expires=")));
    assert!(signed.contains("&signature=hmac-sha256="));
}
