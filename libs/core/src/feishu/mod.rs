//! Client for the two Feishu open-platform endpoints the greeter calls:
//! tenant access token issuance and message delivery.

use std::time::Duration;

use metrics::counter;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

mod client;
mod token;

pub use client::{FeishuClient, MessageSender, SendOutcome};
pub use token::{AppCredentials, FeishuTokenFetcher, StaticToken, TokenSource};

pub const DEFAULT_API_BASE: &str = "https://open.feishu.cn/open-apis";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum FeishuError {
    #[error("feishu transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("feishu remote error (status {status}): {body}")]
    Remote { status: StatusCode, body: String },
    #[error("feishu api error {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("feishu response decode error: {0}")]
    Decode(String),
    #[error("tenant_access_token missing in response")]
    MissingToken,
}

fn endpoint_url(api_base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        api_base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn transport_error(endpoint: &'static str, err: reqwest::Error) -> FeishuError {
    counter!(
        "feishu_api_errors_total",
        "kind" => "transport",
        "endpoint" => endpoint
    )
    .increment(1);
    FeishuError::Transport(err)
}

/// Checks the status and decodes a JSON body.
async fn decode_response<T>(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<T, FeishuError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable>".into());
        counter!(
            "feishu_api_errors_total",
            "kind" => "remote",
            "endpoint" => endpoint,
            "status" => status.as_str().to_string()
        )
        .increment(1);
        return Err(FeishuError::Remote {
            status,
            body: truncate(body),
        });
    }

    response.json::<T>().await.map_err(|err| {
        counter!(
            "feishu_api_errors_total",
            "kind" => "decode",
            "endpoint" => endpoint
        )
        .increment(1);
        FeishuError::Decode(err.to_string())
    })
}

fn truncate(body: String) -> String {
    if body.chars().count() > MAX_ERROR_BODY {
        body.chars().take(MAX_ERROR_BODY).collect()
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_without_double_slash() {
        assert_eq!(
            endpoint_url("https://open.feishu.cn/open-apis/", "/im/v1/messages"),
            "https://open.feishu.cn/open-apis/im/v1/messages"
        );
        assert_eq!(
            endpoint_url(DEFAULT_API_BASE, "auth/v3/tenant_access_token/internal"),
            "https://open.feishu.cn/open-apis/auth/v3/tenant_access_token/internal"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "错".repeat(MAX_ERROR_BODY + 10);
        let cut = truncate(long);
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY);
        assert_eq!(truncate("short".into()), "short");
    }

    #[test]
    fn error_messages_carry_details() {
        let err = FeishuError::Api {
            code: 99991663,
            msg: "invalid access token".into(),
        };
        assert_eq!(err.to_string(), "feishu api error 99991663: invalid access token");
        let err = FeishuError::Remote {
            status: StatusCode::BAD_REQUEST,
            body: "{}".into(),
        };
        assert_eq!(err.to_string(), "feishu remote error (status 400 Bad Request): {}");
    }
}
