use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use greeter_core::{
    AppCredentials, FeishuClient, FeishuError, FeishuTokenFetcher, MessageSender, OutboundMessage,
    TokenSource, welcome_card,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    authorization: Option<String>,
    query: HashMap<String, String>,
    body: Value,
}

#[derive(Clone, Default)]
struct MockFeishu {
    calls: Arc<Mutex<Vec<Captured>>>,
}

impl MockFeishu {
    fn record(&self, path: String, headers: &HeaderMap, query: HashMap<String, String>, body: Value) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.calls.lock().unwrap().push(Captured {
            path,
            authorization,
            query,
            body,
        });
    }

    fn calls(&self) -> Vec<Captured> {
        self.calls.lock().unwrap().clone()
    }
}

async fn token(
    State(mock): State<MockFeishu>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let ok = body["app_secret"] == "secret";
    mock.record("token".into(), &headers, HashMap::new(), body);
    if ok {
        (
            StatusCode::OK,
            Json(json!({ "code": 0, "msg": "ok", "tenant_access_token": "t-abc", "expire": 7200 })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({ "code": 10014, "msg": "app secret invalid" })),
        )
    }
}

async fn send(
    State(mock): State<MockFeishu>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let receive_id = body["receive_id"].as_str().unwrap_or_default().to_string();
    mock.record("send".into(), &headers, query, body);
    if receive_id == "oc_broken" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": 230001, "msg": "invalid receive_id" })),
        );
    }
    if receive_id == "oc_rejected" {
        return (
            StatusCode::OK,
            Json(json!({ "code": 230002, "msg": "bot not in chat" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "code": 0, "msg": "success", "data": { "message_id": "om_new" } })),
    )
}

async fn reply(
    State(mock): State<MockFeishu>,
    Path(message_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    mock.record(format!("reply:{message_id}"), &headers, HashMap::new(), body);
    Json(json!({ "code": 0, "msg": "success", "data": { "message_id": "om_reply" } }))
}

async fn spawn_mock() -> Option<(String, MockFeishu, tokio::task::JoinHandle<()>)> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("skipping feishu api test: {err}");
            return None;
        }
    };
    let addr: SocketAddr = listener.local_addr().unwrap();
    let mock = MockFeishu::default();
    let app = Router::new()
        .route("/open-apis/auth/v3/tenant_access_token/internal", post(token))
        .route("/open-apis/im/v1/messages", post(send))
        .route("/open-apis/im/v1/messages/{message_id}/reply", post(reply))
        .with_state(mock.clone());
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app.into_make_service()).await {
            eprintln!("feishu mock server error: {err}");
        }
    });
    Some((format!("http://{addr}/open-apis"), mock, server))
}

fn credentials(secret: &str) -> AppCredentials {
    AppCredentials {
        app_id: "cli_test".into(),
        app_secret: secret.into(),
    }
}

#[tokio::test]
async fn fetches_tenant_access_token() {
    let Some((base, mock, server)) = spawn_mock().await else {
        return;
    };
    let fetcher = FeishuTokenFetcher::new(reqwest::Client::new(), credentials("secret"), Some(base));
    assert_eq!(fetcher.fetch_token().await.unwrap(), "t-abc");

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body, json!({ "app_id": "cli_test", "app_secret": "secret" }));
    server.abort();
}

#[tokio::test]
async fn token_api_error_is_surfaced() {
    let Some((base, _mock, server)) = spawn_mock().await else {
        return;
    };
    let fetcher = FeishuTokenFetcher::new(reqwest::Client::new(), credentials("wrong"), Some(base));
    let err = fetcher.fetch_token().await.expect_err("bad secret");
    assert!(matches!(err, FeishuError::Api { code: 10014, .. }));
    server.abort();
}

#[tokio::test]
async fn send_posts_with_bearer_and_chat_id_type() {
    let Some((base, mock, server)) = spawn_mock().await else {
        return;
    };
    let client = FeishuClient::new(reqwest::Client::new(), Some(base));
    let message = OutboundMessage::interactive("oc_1", &welcome_card("<at id=ou_a></at>"));
    let outcome = client.send("t-abc", &message).await.unwrap();
    assert_eq!(outcome.code, 0);
    assert_eq!(outcome.msg, "success");
    assert_eq!(outcome.message_id.as_deref(), Some("om_new"));

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer t-abc"));
    assert_eq!(calls[0].query.get("receive_id_type").map(String::as_str), Some("chat_id"));
    assert_eq!(calls[0].body["receive_id"], "oc_1");
    assert_eq!(calls[0].body["msg_type"], "interactive");
    assert!(calls[0].body["content"].as_str().unwrap().contains("ou_a"));
    server.abort();
}

#[tokio::test]
async fn platform_rejection_passes_through_code() {
    let Some((base, _mock, server)) = spawn_mock().await else {
        return;
    };
    let client = FeishuClient::new(reqwest::Client::new(), Some(base));
    let outcome = client
        .send("t-abc", &OutboundMessage::text("oc_rejected", "hi"))
        .await
        .unwrap();
    assert_eq!(outcome.code, 230002);
    assert_eq!(outcome.msg, "bot not in chat");
    assert!(outcome.message_id.is_none());
    server.abort();
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let Some((base, _mock, server)) = spawn_mock().await else {
        return;
    };
    let client = FeishuClient::new(reqwest::Client::new(), Some(base));
    let err = client
        .send("t-abc", &OutboundMessage::text("oc_broken", "hi"))
        .await
        .expect_err("400 should fail");
    match err {
        FeishuError::Remote { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert!(body.contains("invalid receive_id"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn reply_targets_message_id() {
    let Some((base, mock, server)) = spawn_mock().await else {
        return;
    };
    let client = FeishuClient::new(reqwest::Client::new(), Some(base));
    let message = OutboundMessage::text("", &greeter_core::mention_text(Some("ou_a"), "pong"));
    let outcome = client.reply("t-abc", "om_42", &message).await.unwrap();
    assert_eq!(outcome.message_id.as_deref(), Some("om_reply"));

    let calls = mock.calls();
    assert_eq!(calls[0].path, "reply:om_42");
    assert_eq!(calls[0].body["msg_type"], "text");
    assert_eq!(
        calls[0].body["content"],
        r#"{"text":"<at user_id=\"ou_a\"></at> pong"}"#
    );
    server.abort();
}

#[tokio::test]
async fn reply_keeps_reserved_characters_inside_the_id_segment() {
    let Some((base, mock, server)) = spawn_mock().await else {
        return;
    };
    let client = FeishuClient::new(reqwest::Client::new(), Some(base));
    let message = OutboundMessage::text("", "pong");
    client.reply("t-abc", "om/1?x=y", &message).await.unwrap();

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "reply:om/1?x=y");
    server.abort();
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    let client = FeishuClient::new(
        reqwest::Client::new(),
        Some("http://127.0.0.1:1/open-apis".into()),
    );
    let err = client
        .send("t", &OutboundMessage::text("oc_1", "hi"))
        .await
        .expect_err("nothing listens on port 1");
    assert!(matches!(err, FeishuError::Transport(_)));
}
