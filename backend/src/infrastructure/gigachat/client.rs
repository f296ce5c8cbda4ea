/// Authenticated HTTP client for the GigaChat API
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens this close to expiry are refreshed before use
const TOKEN_REFRESH_MARGIN_MS: i64 = 60_000;

#[derive(Error, Debug)]
pub enum GigaChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GigaChat returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type GigaChatResult<T> = Result<T, GigaChatError>;

/// Connection settings for GigaChat
#[derive(Debug, Clone)]
pub struct GigaChatConfig {
    /// Base64 authorization key issued for the client
    pub credentials: String,
    pub scope: String,
    pub auth_url: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub verify_ssl: bool,
    pub timeout: Duration,
}

impl Default for GigaChatConfig {
    fn default() -> Self {
        GigaChatConfig {
            credentials: String::new(),
            scope: "GIGACHAT_API_PERS".to_string(),
            auth_url: "https://ngw.devices.sberbank.ru:9443/api/v2/oauth".to_string(),
            base_url: "https://gigachat.devices.sberbank.ru/api/v1".to_string(),
            chat_model: "GigaChat".to_string(),
            embedding_model: "Embeddings".to_string(),
            verify_ssl: false,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AccessToken {
    access_token: String,
    /// Expiry as epoch milliseconds
    expires_at: i64,
}

/// Client that obtains and caches OAuth tokens and issues API calls
pub struct GigaChatClient {
    http: Client,
    config: GigaChatConfig,
    token: Mutex<Option<AccessToken>>,
}

impl GigaChatClient {
    pub fn new(config: GigaChatConfig) -> GigaChatResult<Self> {
        if config.credentials.trim().is_empty() {
            return Err(GigaChatError::Auth("missing GigaChat credentials".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        info!("GigaChat client configured for {}", config.base_url);

        Ok(GigaChatClient {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &GigaChatConfig {
        &self.config
    }

    /// Current access token, fetching a new one when missing or expiring
    pub async fn access_token(&self) -> GigaChatResult<String> {
        let mut cached = self.token.lock().await;
        let now = chrono::Utc::now().timestamp_millis();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_REFRESH_MARGIN_MS > now {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting GigaChat access token");
        let auth_header = HeaderValue::from_str(&format!("Basic {}", self.config.credentials.trim()))
            .map_err(|e| GigaChatError::Auth(format!("invalid credentials: {}", e)))?;

        let response = self
            .http
            .post(&self.config.auth_url)
            .header(AUTHORIZATION, auth_header)
            .header("RqUID", uuid::Uuid::new_v4().to_string())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("scope={}", self.config.scope))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GigaChatError::Auth(format!("{}: {}", status.as_u16(), body)));
        }

        let token: AccessToken = response.json().await?;
        if token.access_token.is_empty() {
            return Err(GigaChatError::Auth("empty access token".to_string()));
        }

        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// POST a JSON body to `{base_url}/{path}` and decode the JSON response
    pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> GigaChatResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GigaChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| GigaChatError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_rejected() {
        let result = GigaChatClient::new(GigaChatConfig::default());
        assert!(matches!(result, Err(GigaChatError::Auth(_))));
    }

    #[test]
    fn test_default_config() {
        let config = GigaChatConfig::default();
        assert_eq!(config.scope, "GIGACHAT_API_PERS");
        assert_eq!(config.embedding_model, "Embeddings");
        assert!(!config.verify_ssl);
    }
}
