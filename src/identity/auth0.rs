use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;

use super::{IdentityError, IdentityProvider};
use crate::config::Config;
use crate::storage::models::{TokenSet, UserProfile};

/// Auth0-style OIDC client (`/authorize`, `/oauth/token`, `/userinfo`, `/v2/logout`).
pub struct Auth0Client {
    client: Client,
    issuer_base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    return_to: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

impl Auth0Client {
    pub fn new(config: &Config) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| IdentityError::Http(e.to_string()))?;

        Ok(Self {
            client,
            issuer_base_url: config.identity.issuer_base_url.clone(),
            client_id: config.identity.client_id.clone(),
            client_secret: config.identity.client_secret.clone(),
            redirect_uri: config.callback_url(),
            return_to: config.server.app_base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.issuer_base_url)
    }
}

#[async_trait]
impl IdentityProvider for Auth0Client {
    fn authorize_url(
        &self,
        state: &str,
        screen_hint: Option<&str>,
    ) -> Result<String, IdentityError> {
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", "openid profile email"),
            ("state", state),
        ];
        if let Some(hint) = screen_hint {
            params.push(("screen_hint", hint));
        }

        Url::parse_with_params(&self.endpoint("/authorize"), &params)
            .map(String::from)
            .map_err(|e| IdentityError::InvalidUrl(e.to_string()))
    }

    fn logout_url(&self) -> Result<String, IdentityError> {
        Url::parse_with_params(
            &self.endpoint("/v2/logout"),
            &[
                ("client_id", self.client_id.as_str()),
                ("returnTo", self.return_to.as_str()),
            ],
        )
        .map(String::from)
        .map_err(|e| IdentityError::InvalidUrl(e.to_string()))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, IdentityError> {
        let resp = self
            .client
            .post(self.endpoint("/oauth/token"))
            .json(&TokenRequest {
                grant_type: "authorization_code",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                code,
                redirect_uri: &self.redirect_uri,
            })
            .send()
            .await
            .map_err(|e| IdentityError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected { status, body });
        }

        resp.json()
            .await
            .map_err(|e| IdentityError::Http(e.to_string()))
    }

    async fn user_info(&self, access_token: &str) -> Result<UserProfile, IdentityError> {
        let resp = self
            .client
            .get(self.endpoint("/userinfo"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected { status, body });
        }

        resp.json()
            .await
            .map_err(|e| IdentityError::Http(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Auth0Client {
        Auth0Client {
            client: Client::new(),
            issuer_base_url: "https://tenant.auth0.com".to_string(),
            client_id: "abc".to_string(),
            client_secret: "shh".to_string(),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            return_to: "http://localhost:8080".to_string(),
        }
    }

    #[test]
    fn test_authorize_url_carries_oidc_params() {
        let url = client().authorize_url("xyz", None).unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/authorize");

        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("client_id".into(), "abc".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:8080/callback".into()
        )));
        assert!(pairs.contains(&("scope".into(), "openid profile email".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "screen_hint"));
    }

    #[test]
    fn test_authorize_url_passes_screen_hint() {
        let url = client().authorize_url("s", Some("signup")).unwrap();
        assert!(url.contains("screen_hint=signup"));
    }

    #[test]
    fn test_logout_url() {
        let url = client().logout_url().unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/v2/logout");
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("returnTo".into(), "http://localhost:8080".into())));
    }
}
