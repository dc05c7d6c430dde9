//! Start-up configuration read from the process environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use greeter_core::{AppCredentials, FeishuTokenFetcher, StaticToken, TokenSource};

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub bind: SocketAddr,
    pub api_base: Option<String>,
    pub credentials: Option<AppCredentials>,
    /// Only consulted when no app credentials are configured.
    pub bearer_token: Option<String>,
    pub audit_db_path: Option<PathBuf>,
}

impl WebhookConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind: SocketAddr = value("BIND")
            .unwrap_or_else(|| DEFAULT_BIND.into())
            .parse()
            .context("invalid BIND address")?;

        let credentials = match (value("FEISHU_APP_ID"), value("FEISHU_APP_SECRET")) {
            (Some(app_id), Some(app_secret)) => Some(AppCredentials { app_id, app_secret }),
            (None, None) => None,
            _ => bail!("FEISHU_APP_ID and FEISHU_APP_SECRET must be set together"),
        };
        let bearer_token = value("FEISHU_BEARER_TOKEN");
        if credentials.is_none() && bearer_token.is_none() {
            bail!("either FEISHU_APP_ID/FEISHU_APP_SECRET or FEISHU_BEARER_TOKEN is required");
        }

        Ok(Self {
            bind,
            api_base: value("FEISHU_API_BASE"),
            credentials,
            bearer_token,
            audit_db_path: value("AUDIT_DB_PATH").map(PathBuf::from),
        })
    }

    /// App credentials win; a configured bearer token is the fallback.
    pub fn token_source(&self, http: reqwest::Client) -> Result<Arc<dyn TokenSource>> {
        if let Some(credentials) = self.credentials.clone() {
            return Ok(Arc::new(FeishuTokenFetcher::new(
                http,
                credentials,
                self.api_base.clone(),
            )));
        }
        match self.bearer_token.as_ref() {
            Some(token) => {
                tracing::warn!("no app credentials configured; using static bearer token");
                Ok(Arc::new(StaticToken::new(token.clone())))
            }
            None => bail!("no token source configured"),
        }
    }
}
