//! Shared test helpers: an in-process identity provider and a ready-made AppState.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ring::hmac;

use crate::config::{Config, IdentityConfig, ServerConfig, SessionConfig, UploadConfig};
use crate::identity::{IdentityError, IdentityProvider};
use crate::storage::models::{Session, TokenSet, UserProfile};
use crate::storage::Database;
use crate::upload_service::UploadThingClient;
use crate::AppState;

pub const TEST_UPLOAD_SECRET: &str = "sk_test_filebox";
pub const TEST_FILE_HOST: &str = "https://testapp.ufs.sh";

/// Identity provider that accepts codes of the form `code-{sub}` for the
/// subjects it was created with.
pub struct FakeIdentityProvider {
    users: HashMap<String, UserProfile>,
}

impl FakeIdentityProvider {
    pub fn new(subjects: &[&str]) -> Self {
        let users = subjects
            .iter()
            .map(|sub| (sub.to_string(), profile(sub)))
            .collect();
        Self { users }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn authorize_url(
        &self,
        state: &str,
        screen_hint: Option<&str>,
    ) -> Result<String, IdentityError> {
        let mut url = format!("https://idp.test/authorize?state={state}");
        if let Some(hint) = screen_hint {
            url.push_str(&format!("&screen_hint={hint}"));
        }
        Ok(url)
    }

    fn logout_url(&self) -> Result<String, IdentityError> {
        Ok("https://idp.test/v2/logout".to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, IdentityError> {
        let sub = code
            .strip_prefix("code-")
            .filter(|sub| self.users.contains_key(*sub))
            .ok_or_else(|| IdentityError::Rejected {
                status: 403,
                body: "invalid_grant".to_string(),
            })?;

        Ok(TokenSet {
            access_token: format!("token-{sub}"),
            id_token: None,
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            expires_in: Some(86400),
        })
    }

    async fn user_info(&self, access_token: &str) -> Result<UserProfile, IdentityError> {
        access_token
            .strip_prefix("token-")
            .and_then(|sub| self.users.get(sub))
            .cloned()
            .ok_or(IdentityError::Rejected {
                status: 401,
                body: "invalid_token".to_string(),
            })
    }
}

pub fn profile(sub: &str) -> UserProfile {
    UserProfile {
        sub: sub.to_string(),
        name: Some(format!("User {sub}")),
        email: Some(format!("{sub}@example.com")),
        picture: None,
        extra: HashMap::new(),
    }
}

pub fn test_config(data_dir: &Path) -> Config {
    Config {
        server: ServerConfig {
            data_dir: data_dir.to_string_lossy().to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        },
        identity: IdentityConfig {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            issuer_base_url: "https://idp.test".to_string(),
        },
        uploads: UploadConfig {
            app_id: "testapp".to_string(),
            file_host: TEST_FILE_HOST.to_string(),
            ingest_url: "https://ingest.test".to_string(),
            max_upload_size: 2 * 1024 * 1024,
            secret: TEST_UPLOAD_SECRET.to_string(),
        },
        session: SessionConfig::default(),
    }
}

/// AppState over a fresh database in `data_dir`, knowing users `alice` and `bob`.
pub fn test_state(data_dir: &Path) -> Arc<AppState> {
    let config = test_config(data_dir);
    let db = Database::open(data_dir).expect("Failed to open test database");
    let uploads = UploadThingClient::new(&config.uploads);

    Arc::new(AppState {
        config,
        db,
        identity: Arc::new(FakeIdentityProvider::new(&["alice", "bob"])),
        uploads: Arc::new(uploads),
    })
}

/// Store a live session for `sub` and return it.
pub fn create_session(state: &AppState, sub: &str) -> Session {
    let now = Utc::now();
    let session = Session {
        id: format!("session-{sub}-{}", uuid::Uuid::new_v4()),
        user: profile(sub),
        tokens: TokenSet {
            access_token: format!("token-{sub}"),
            id_token: None,
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            expires_in: None,
        },
        created_at: now,
        expires_at: now + Duration::days(7),
    };
    state
        .db
        .put_session(&session)
        .expect("Failed to store test session");
    session
}

/// `Cookie` header value presenting `session`.
pub fn cookie_header(session: &Session) -> String {
    format!("{}={}", crate::api::session::SESSION_COOKIE, session.id)
}

/// Signature header value the upload service would send for `body`.
pub fn callback_signature(body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, TEST_UPLOAD_SECRET.as_bytes());
    let tag = hmac::sign(&key, body);
    format!("hmac-sha256={}", hex::encode(tag.as_ref()))
}
