mod auth0;

pub use auth0::Auth0Client;

use async_trait::async_trait;
use thiserror::Error;

use crate::storage::models::{TokenSet, UserProfile};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
    #[error("Provider request failed: {0}")]
    Http(String),
    #[error("Provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// OpenID Connect identity provider used for browser login.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to for login. `screen_hint` is passed through
    /// (e.g. `signup`).
    fn authorize_url(&self, state: &str, screen_hint: Option<&str>)
        -> Result<String, IdentityError>;

    /// URL that ends the provider-side session and returns to the app.
    fn logout_url(&self) -> Result<String, IdentityError>;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, IdentityError>;

    /// Fetch the profile of the user owning `access_token`.
    async fn user_info(&self, access_token: &str) -> Result<UserProfile, IdentityError>;
}
