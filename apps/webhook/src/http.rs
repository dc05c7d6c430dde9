use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode, header::HeaderName},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use greeter_core::InboundEvent;
use serde_json::json;
use uuid::Uuid;

use crate::handler::{EventHandler, InvocationContext, Trigger};

/// Header carrying how the invocation was started (`DEBUG` or `ONLINE`).
pub const TRIGGER_HEADER: &str = "x-invocation-trigger";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<EventHandler>,
}

impl AppState {
    pub fn new(handler: EventHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_event))
        .route("/webhook/event", post(handle_event))
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn(with_request_id))
        .with_state(state)
}

async fn with_request_id(mut req: Request<Body>, next: Next) -> Response {
    let rid = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(rid.clone()));

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&rid) {
        res.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    res
}

async fn healthz() -> &'static str {
    "ok"
}

async fn handle_event(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event = InboundEvent::from_slice(&body);
    let ctx = InvocationContext {
        trigger: Trigger::from_header(
            headers
                .get(TRIGGER_HEADER)
                .and_then(|value| value.to_str().ok()),
        ),
        request_id: Some(request_id),
    };

    match state.handler.handle(event, &ctx).await {
        Ok(outcome) => match outcome.body() {
            Some(body) => (StatusCode::OK, Json(body)).into_response(),
            None => StatusCode::OK.into_response(),
        },
        Err(err) => {
            tracing::error!(error = %err, "event handling failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}
