use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad classification of a file, derived from its content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Text,
    Other,
}

impl FileKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let primary = content_type
            .and_then(|ct| ct.split('/').next())
            .unwrap_or("");
        match primary {
            "image" => FileKind::Image,
            "text" => FileKind::Text,
            _ => FileKind::Other,
        }
    }
}

/// A file record stored in redb, owned by exactly one session subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    pub storage_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn kind(&self) -> FileKind {
        FileKind::from_content_type(self.content_type.as_deref())
    }
}

/// Pending uploads not completed within this window can no longer be completed.
pub const PENDING_UPLOAD_TTL_SECONDS: i64 = 3600;

/// Binds a generated file id to its owner between upload initiation and completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpload {
    pub file_id: String,
    pub owner_id: String,
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingUpload {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.created_at < now - chrono::Duration::seconds(PENDING_UPLOAD_TTL_SECONDS)
    }
}

/// Final object metadata reported by the upload service once bytes are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedUpload {
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub storage_url: String,
}

/// Result of binding a completed upload to its pending owner
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Created(FileRecord),
    /// No pending upload with that id (never initiated, expired, or already completed)
    UnknownUpload,
    /// A file record with that id already exists; nothing was written
    AlreadyExists,
}

/// Profile returned by the identity provider's userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    /// Remaining provider claims, passed through untouched
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Tokens obtained from the authorization code exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Server-side session, keyed by the opaque id carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user: UserProfile,
    pub tokens: TokenSet,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn subject(&self) -> &str {
        &self.user.sub
    }
}

/// Aggregate figures over one owner's files
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileStats {
    pub total_files: u64,
    pub total_bytes: u64,
    pub images: u64,
    pub text: u64,
    pub other: u64,
    pub recent: u64,
}
