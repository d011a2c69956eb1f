use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    pub uploads: UploadConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Public base URL of this service, used for OAuth redirect targets.
    pub app_base_url: String,
    pub bind_address: String,
    pub data_dir: String,
    /// How often expired sessions and stale pending uploads are swept (seconds)
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub client_id: String,
    pub client_secret: String,
    /// e.g. `https://tenant.us.auth0.com`
    pub issuer_base_url: String,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub app_id: String,
    /// Host serving stored objects. Defaults to `https://{app_id}.ufs.sh`.
    pub file_host: String,
    pub ingest_url: String,
    /// Maximum size of a single uploaded file in bytes
    pub max_upload_size: u64,
    /// Shared secret used to sign URLs and verify completion callbacks
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_secure: bool,
    pub max_age_seconds: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_base_url: "http://localhost:8080".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
            sweep_interval_seconds: 300,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_secure: false,
            max_age_seconds: 60 * 60 * 24 * 7, // 7 days
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let bind_address = std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address);
        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.data_dir);
        let app_base_url = std::env::var("APP_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.app_base_url);

        let sweep_interval_seconds = std::env::var("SWEEP_INTERVAL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.sweep_interval_seconds);

        let issuer_base_url = std::env::var("AUTH0_ISSUER_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_default();
        let client_id = std::env::var("AUTH0_CLIENT_ID").unwrap_or_default();
        let client_secret = std::env::var("AUTH0_CLIENT_SECRET").unwrap_or_default();

        let app_id = std::env::var("UPLOADTHING_APP_ID").unwrap_or_default();
        let secret = std::env::var("UPLOADTHING_SECRET").unwrap_or_default();
        let ingest_url = std::env::var("UPLOADTHING_INGEST_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "https://sea1.ingest.uploadthing.com".to_string());
        let file_host = std::env::var("UPLOADTHING_FILE_HOST")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("https://{app_id}.ufs.sh"));

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2 * 1024 * 1024); // 2MB

        let session_defaults = SessionConfig::default();
        let max_age_seconds = std::env::var("SESSION_MAX_AGE_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(session_defaults.max_age_seconds);
        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(session_defaults.cookie_secure);

        let config = Config {
            server: ServerConfig {
                app_base_url,
                bind_address,
                data_dir,
                sweep_interval_seconds,
            },
            identity: IdentityConfig {
                client_id,
                client_secret,
                issuer_base_url,
            },
            uploads: UploadConfig {
                app_id,
                file_host,
                ingest_url,
                max_upload_size,
                secret,
            },
            session: SessionConfig {
                cookie_secure,
                max_age_seconds,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("AUTH0_ISSUER_BASE_URL", &self.identity.issuer_base_url),
            ("AUTH0_CLIENT_ID", &self.identity.client_id),
            ("AUTH0_CLIENT_SECRET", &self.identity.client_secret),
            ("UPLOADTHING_APP_ID", &self.uploads.app_id),
            ("UPLOADTHING_SECRET", &self.uploads.secret),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(ConfigError::ValidationError(format!("{name} is required")));
            }
        }

        if self.session.max_age_seconds <= 0 {
            return Err(ConfigError::ValidationError(
                "SESSION_MAX_AGE_SECONDS must be positive".to_string(),
            ));
        }

        if self.uploads.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.session.cookie_secure && !self.server.app_base_url.starts_with("https://") {
            tracing::warn!(
                "COOKIE_SECURE is set but APP_BASE_URL is not https; browsers will drop the session cookie"
            );
        }

        Ok(())
    }

    /// Redirect target registered with the identity provider.
    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.server.app_base_url)
    }
}
