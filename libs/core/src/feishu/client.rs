use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{
    DEFAULT_API_BASE, FeishuError, REQUEST_TIMEOUT, decode_response, endpoint_url, transport_error,
};
use crate::message::OutboundMessage;

/// The platform's verdict on a delivered message. A non-zero `code` is a
/// platform-side rejection and is passed through, not turned into an error.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub code: i64,
    pub msg: String,
    pub message_id: Option<String>,
    pub raw: Value,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Posts `message` into the chat named by its `receive_id`.
    async fn send(&self, token: &str, message: &OutboundMessage)
    -> Result<SendOutcome, FeishuError>;

    /// Replies to an existing message; `message.receive_id` is ignored.
    async fn reply(
        &self,
        token: &str,
        message_id: &str,
        message: &OutboundMessage,
    ) -> Result<SendOutcome, FeishuError>;
}

pub struct FeishuClient {
    http: Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct RawSendResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<Value>,
}

impl FeishuClient {
    pub fn new(http: Client, api_base: Option<String>) -> Self {
        Self {
            http,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.into()),
        }
    }

    fn messages_url(&self) -> String {
        endpoint_url(&self.api_base, "im/v1/messages?receive_id_type=chat_id")
    }

    fn reply_url(&self, message_id: &str) -> String {
        let message_id = urlencoding::encode(message_id);
        endpoint_url(&self.api_base, &format!("im/v1/messages/{message_id}/reply"))
    }

    async fn post(
        &self,
        endpoint: &'static str,
        url: String,
        token: &str,
        body: &Value,
    ) -> Result<SendOutcome, FeishuError> {
        let response = self
            .http
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|err| transport_error(endpoint, err))?;

        let raw: Value = decode_response(endpoint, response).await?;
        let parsed: RawSendResponse = serde_json::from_value(raw.clone())
            .map_err(|err| FeishuError::Decode(err.to_string()))?;
        let message_id = parsed
            .data
            .as_ref()
            .and_then(|d| d.get("message_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(SendOutcome {
            code: parsed.code,
            msg: parsed.msg,
            message_id,
            raw,
        })
    }
}

#[async_trait]
impl MessageSender for FeishuClient {
    async fn send(
        &self,
        token: &str,
        message: &OutboundMessage,
    ) -> Result<SendOutcome, FeishuError> {
        let body =
            serde_json::to_value(message).map_err(|err| FeishuError::Decode(err.to_string()))?;
        self.post("im.messages.create", self.messages_url(), token, &body)
            .await
    }

    async fn reply(
        &self,
        token: &str,
        message_id: &str,
        message: &OutboundMessage,
    ) -> Result<SendOutcome, FeishuError> {
        self.post(
            "im.messages.reply",
            self.reply_url(message_id),
            token,
            &message.reply_body(),
        )
        .await
    }
}
