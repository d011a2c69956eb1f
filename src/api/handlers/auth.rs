use axum::extract::State;
use axum::response::Redirect;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::AppError;
use crate::api::response::{AppQuery, JSend};
use crate::api::session::{
    auth_state_cookie, random_token, removal_cookie, session_cookie, AuthSession,
    AUTH_STATE_COOKIE, SESSION_COOKIE,
};
use crate::storage::models::{Session, UserProfile};
use crate::AppState;

/// Where the browser lands after a successful login
const POST_LOGIN_PATH: &str = "/upload";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    pub screen_hint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<LoginParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let oauth_state = random_token()?;
    let url = state
        .identity
        .authorize_url(&oauth_state, params.screen_hint.as_deref())?;

    let jar = jar.add(auth_state_cookie(oauth_state, &state.config.session));
    Ok((jar, Redirect::to(&url)))
}

pub async fn callback(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<CallbackParams>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        if let Some(ref error) = params.error {
            tracing::info!(error = %error, "Identity provider returned an error");
        }
        return auth_failure(jar, "no_code");
    };

    let expected_state = jar.get(AUTH_STATE_COOKIE).map(|c| c.value().to_string());
    if expected_state.is_none() || expected_state != params.state {
        tracing::warn!("OAuth state mismatch on callback");
        return auth_failure(jar, "invalid_state");
    }

    let tokens = match state.identity.exchange_code(&code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "Authorization code exchange failed");
            return auth_failure(jar, "auth_failed");
        }
    };

    let user = match state.identity.user_info(&tokens.access_token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch user profile");
            return auth_failure(jar, "auth_failed");
        }
    };

    let session_id = match random_token() {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to generate session id");
            return auth_failure(jar, "session_failed");
        }
    };

    let now = Utc::now();
    let session = Session {
        id: session_id.clone(),
        user,
        tokens,
        created_at: now,
        expires_at: now + Duration::seconds(state.config.session.max_age_seconds),
    };

    if let Err(e) = state.db.put_session(&session) {
        tracing::error!(error = %e, "Failed to store session");
        return auth_failure(jar, "session_failed");
    }

    tracing::info!(owner_id = %session.user.sub, "User logged in");

    let jar = jar
        .remove(removal_cookie(AUTH_STATE_COOKIE))
        .add(session_cookie(session_id, &state.config.session));
    (jar, Redirect::to(POST_LOGIN_PATH))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        // Cookie is cleared either way; a leftover row expires and gets swept.
        if let Err(e) = state.db.delete_session(cookie.value()) {
            tracing::warn!(error = %e, "Failed to delete session on logout");
        }
    }

    let url = state.identity.logout_url()?;
    Ok((jar.remove(removal_cookie(SESSION_COOKIE)), Redirect::to(&url)))
}

pub async fn current_session(session: AuthSession) -> Json<JSend<UserProfile>> {
    JSend::success(session.0.user)
}

// ============================================================================
// Helpers
// ============================================================================

fn auth_failure(jar: CookieJar, tag: &str) -> (CookieJar, Redirect) {
    (
        jar.remove(removal_cookie(AUTH_STATE_COOKIE)),
        Redirect::to(&format!("/?error={tag}")),
    )
}
