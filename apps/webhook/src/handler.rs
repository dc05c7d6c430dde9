//! Per-invocation handling of a Feishu event callback.
//!
//! The flow is a fixed sequence of guards, each an early return, followed by
//! the welcome dispatch for member-added events. Audit writes happen along the
//! way and never influence the outcome.

use std::sync::Arc;

use greeter_core::{
    AuditTable, FeishuError, InboundEvent, MessageSender, OutboundMessage, SharedAuditStore,
    TokenSource, mention_tags, welcome_card,
};
use greeter_telemetry::{TelemetryLabels, record_counter, with_event_fields};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{Instrument, field::Empty};

pub const ENCRYPT_ENABLED_ERROR: &str = "请在飞书机器人配置中移除 Encrypt Key。";
pub const DEBUG_TRIGGER_ERROR: &str =
    "如机器人已配置好，请先通过与机器人聊天测试，再使用「Mock by online requests」功能调试。";
pub const MISSING_PERMISSION_ERROR: &str =
    "请参考教程配置好飞书机器人的事件权限，相关权限需发布机器人后才能生效。";
pub const SEND_FAILED_NOTE: &str = "返回值错误！";

const EVENTS_RECEIVED: &str = "events_received";
const EVENTS_IGNORED: &str = "events_ignored";
const WELCOME_SENT: &str = "welcome_sent";
const WELCOME_FAILED: &str = "welcome_failed";

/// How the invocation was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    #[default]
    Online,
    /// Replayed from the hosting console's debug panel.
    Debug,
}

impl Trigger {
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("debug") => Trigger::Debug,
            _ => Trigger::Online,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    pub trigger: Trigger,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// Plain-language message for whoever is configuring the bot.
    Rejected(String),
    /// Verification handshake echo.
    Challenge(Value),
    /// Result of the welcome dispatch; `code == -1` when it failed locally.
    Reply { code: i64, msg: String },
    /// Event type not handled; nothing is returned.
    Ignored,
}

impl HandlerOutcome {
    /// JSON body returned to the caller, `None` for [`HandlerOutcome::Ignored`].
    pub fn body(&self) -> Option<Value> {
        match self {
            HandlerOutcome::Rejected(error) => Some(json!({ "error": error })),
            HandlerOutcome::Challenge(challenge) => Some(json!({ "challenge": challenge })),
            HandlerOutcome::Reply { code, msg } => Some(json!({ "code": code, "msg": msg })),
            HandlerOutcome::Ignored => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("tenant access token fetch failed: {0}")]
    Token(#[from] FeishuError),
}

pub struct EventHandler {
    tokens: Arc<dyn TokenSource>,
    sender: Arc<dyn MessageSender>,
    audit: SharedAuditStore,
}

impl EventHandler {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        sender: Arc<dyn MessageSender>,
        audit: SharedAuditStore,
    ) -> Self {
        Self {
            tokens,
            sender,
            audit,
        }
    }

    pub async fn handle(
        &self,
        event: InboundEvent,
        ctx: &InvocationContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        let span = tracing::info_span!(
            "webhook.handle",
            request_id = %ctx.request_id.as_deref().unwrap_or("n/a"),
            event_id = Empty,
            event_type = Empty,
            chat_id = Empty
        );
        with_event_fields(&span, event.event_id(), event.event_type(), event.chat_id());
        self.dispatch(event, ctx).instrument(span).await
    }

    async fn dispatch(
        &self,
        event: InboundEvent,
        ctx: &InvocationContext,
    ) -> Result<HandlerOutcome, HandlerError> {
        record_counter(
            EVENTS_RECEIVED,
            1,
            &TelemetryLabels::for_event(event.event_type()),
        );

        if event.is_encrypted() {
            tracing::warn!("encrypted callback received; encrypt key must be removed");
            return Ok(HandlerOutcome::Rejected(ENCRYPT_ENABLED_ERROR.into()));
        }

        if let Some(challenge) = event.challenge() {
            tracing::info!("answering url verification challenge");
            return Ok(HandlerOutcome::Challenge(challenge.clone()));
        }

        self.record(AuditTable::Requests, event.raw.clone()).await;

        if event.event_id().is_none() {
            let message = match ctx.trigger {
                Trigger::Debug => DEBUG_TRIGGER_ERROR,
                Trigger::Online => MISSING_PERMISSION_ERROR,
            };
            tracing::warn!(trigger = ?ctx.trigger, "callback without event id");
            return Ok(HandlerOutcome::Rejected(message.into()));
        }

        if !event.is_member_added() {
            tracing::debug!("ignoring event type");
            record_counter(
                EVENTS_IGNORED,
                1,
                &TelemetryLabels::for_event(event.event_type()),
            );
            return Ok(HandlerOutcome::Ignored);
        }

        self.welcome(&event).await
    }

    async fn welcome(&self, event: &InboundEvent) -> Result<HandlerOutcome, HandlerError> {
        let labels = TelemetryLabels::for_event(event.event_type());
        let Some(chat_id) = event.chat_id() else {
            tracing::warn!("member-added event without chat id");
            self.record(
                AuditTable::Contents,
                json!({ "note": SEND_FAILED_NOTE, "error": "event.chat_id missing" }),
            )
            .await;
            record_counter(WELCOME_FAILED, 1, &labels.with_outcome("missing_chat"));
            return Ok(HandlerOutcome::Reply {
                code: -1,
                msg: "event.chat_id missing".into(),
            });
        };

        let open_ids = event.open_ids();
        let mentions = mention_tags(open_ids.iter().copied());
        let message = OutboundMessage::interactive(chat_id, &welcome_card(&mentions));

        let token = self.tokens.fetch_token().await?;

        self.record(
            AuditTable::Contents,
            json!({
                "receive_id": message.receive_id,
                "msg_type": message.msg_type,
                "content": message.content,
            }),
        )
        .await;

        match self.sender.send(&token, &message).await {
            Ok(outcome) => {
                tracing::info!(
                    code = outcome.code,
                    members = open_ids.len(),
                    message_id = ?outcome.message_id,
                    "welcome card dispatched"
                );
                self.record(AuditTable::Contents, outcome.raw.clone()).await;
                record_counter(WELCOME_SENT, 1, &labels.with_outcome(outcome.code.to_string()));
                Ok(HandlerOutcome::Reply {
                    code: outcome.code,
                    msg: outcome.msg,
                })
            }
            Err(err) => {
                tracing::error!(error = %err, "welcome card dispatch failed");
                self.record(
                    AuditTable::Contents,
                    json!({ "note": SEND_FAILED_NOTE, "error": err.to_string() }),
                )
                .await;
                record_counter(WELCOME_FAILED, 1, &labels.with_outcome("send_error"));
                Ok(HandlerOutcome::Reply {
                    code: -1,
                    msg: err.to_string(),
                })
            }
        }
    }

    /// Best-effort audit write; failures are logged and swallowed.
    async fn record(&self, table: AuditTable, body: Value) {
        if let Err(err) = self.audit.append(table, body).await {
            tracing::warn!(table = table.as_str(), error = %err, "audit write failed");
        }
    }
}
