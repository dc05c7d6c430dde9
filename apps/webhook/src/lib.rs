//! Feishu event webhook.
//!
//! Accepts event callbacks on `/webhook/event`, answers the verification
//! handshake and posts a welcome card whenever users are added to a group
//! chat the bot belongs to.

pub mod config;
pub mod handler;
pub mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use greeter_core::{
    FeishuClient, InMemoryAuditStore, MAX_AUDIT_HISTORY, SharedAuditStore, sqlite_store,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use config::WebhookConfig;
pub use handler::{EventHandler, HandlerError, HandlerOutcome, InvocationContext, Trigger};
pub use http::{AppState, build_router};

/// Opens the audit store named by the configuration.
pub fn open_audit_store(config: &WebhookConfig) -> Result<SharedAuditStore> {
    match config.audit_db_path.as_ref() {
        Some(path) => {
            info!(path = %path.display(), "audit log backed by sqlite");
            sqlite_store(path).with_context(|| format!("open audit db {}", path.display()))
        }
        None => {
            warn!(
                max_records = MAX_AUDIT_HISTORY,
                "audit log kept in memory only; set AUDIT_DB_PATH for an inspectable log"
            );
            Ok(InMemoryAuditStore::shared())
        }
    }
}

/// Wires the production token source, Feishu client and audit store into a router.
pub fn build_app(config: &WebhookConfig) -> Result<Router> {
    let http = reqwest::Client::new();
    let tokens = config.token_source(http.clone())?;
    let sender = Arc::new(FeishuClient::new(http, config.api_base.clone()));
    let audit = open_audit_store(config)?;
    let handler = EventHandler::new(tokens, sender, audit);
    Ok(build_router(AppState::new(handler)))
}

pub async fn run(config: WebhookConfig) -> Result<()> {
    let router = build_app(&config)?;
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    info!("greeter-webhook listening on {}", config.bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
