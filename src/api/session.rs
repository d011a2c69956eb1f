//! Session gate: cookie handling and the `AuthSession` extractor.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};

use super::error::AppError;
use crate::config::SessionConfig;
use crate::storage::models::Session;
use crate::AppState;

pub const SESSION_COOKIE: &str = "filebox_session";

/// Holds the OAuth `state` between `/login` and `/callback`.
pub const AUTH_STATE_COOKIE: &str = "filebox_auth_state";

const AUTH_STATE_MAX_AGE_SECONDS: i64 = 600;

/// A live session for the requesting browser. Extracting it rejects with
/// `AppError::Authentication` before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

impl AuthSession {
    pub fn subject(&self) -> &str {
        self.0.subject()
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, AppError> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Authentication)?;

        state
            .db
            .get_session(&session_id, Utc::now())?
            .map(AuthSession)
            .ok_or(AppError::Authentication)
    }
}

/// 32 random bytes, base64url encoded. Used for session ids and OAuth state.
pub fn random_token() -> Result<String, AppError> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal("system RNG unavailable".to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

pub fn session_cookie(session_id: String, config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(config.max_age_seconds))
        .build()
}

pub fn auth_state_cookie(state: String, config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((AUTH_STATE_COOKIE, state))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(AUTH_STATE_MAX_AGE_SECONDS))
        .build()
}

/// Cookie value used to match (and thereby remove) a cookie set on path `/`.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}
