use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{
    DEFAULT_API_BASE, FeishuError, REQUEST_TIMEOUT, decode_response, endpoint_url, transport_error,
};

const TOKEN_ENDPOINT: &str = "auth/v3/tenant_access_token/internal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_secret: String,
}

/// Source of the bearer token used for outbound calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<String, FeishuError>;
}

/// Issues a fresh tenant access token on every call. No caching.
pub struct FeishuTokenFetcher {
    http: Client,
    api_base: String,
    credentials: AppCredentials,
}

impl FeishuTokenFetcher {
    pub fn new(http: Client, credentials: AppCredentials, api_base: Option<String>) -> Self {
        Self {
            http,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.into()),
            credentials,
        }
    }

    fn token_url(&self) -> String {
        endpoint_url(&self.api_base, TOKEN_ENDPOINT)
    }
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: Option<String>,
    #[serde(default)]
    expire: Option<u64>,
}

#[async_trait]
impl TokenSource for FeishuTokenFetcher {
    async fn fetch_token(&self) -> Result<String, FeishuError> {
        let response = self
            .http
            .post(self.token_url())
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({
                "app_id": self.credentials.app_id,
                "app_secret": self.credentials.app_secret,
            }))
            .send()
            .await
            .map_err(|err| transport_error("tenant_access_token", err))?;

        let raw: RawTokenResponse = decode_response("tenant_access_token", response).await?;
        if raw.code != 0 {
            return Err(FeishuError::Api {
                code: raw.code,
                msg: raw.msg,
            });
        }
        let token = raw
            .tenant_access_token
            .filter(|t| !t.is_empty())
            .ok_or(FeishuError::MissingToken)?;
        tracing::debug!(expire = ?raw.expire, "tenant access token issued");
        Ok(token)
    }
}

/// Token configured up front, handed out unchanged.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn fetch_token(&self) -> Result<String, FeishuError> {
        Ok(self.0.clone())
    }
}
