//! HTTP路由handlers

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::Local;

use crate::http::{
    dispatch::{handle_chat_event, handle_ci_webhook, webhook_headers},
    models::HealthResponse,
    state::AppState,
};

/// 创建所有路由；CI webhook 仅在 `ci.enabled` 时挂载
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat/event", post(chat_event_handler))
        .route("/feishu/event", post(chat_event_handler));

    if state.config.ci.enabled {
        router = router.route("/webhook/ci", post(ci_webhook_handler));
        tracing::info!(target: "taskbot.http", "CI webhook endpoint enabled at /webhook/ci");
    }

    router.with_state(state)
}

/// GET / - hello
async fn root_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "Hello": "World",
        "name": state.config.app.name,
    }))
}

/// GET /health - 健康检查
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    state.record_request("/health");
    let stats = state.stats();
    Json(HealthResponse {
        status: "ok".into(),
        name: state.config.app.name.clone(),
        version: state.config.app.version.clone(),
        uptime_seconds: stats.uptime_seconds(),
        requests_handled: stats.requests_total,
        errors: stats.errors_total,
        timestamp: Local::now().to_rfc3339(),
    })
}

/// POST /chat/event - 飞书事件回调
async fn chat_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record_request("/chat/event");
    handle_chat_event(&state, &webhook_headers(&headers), &body)
        .await
        .into_response()
}

/// POST /webhook/ci - CI 状态回写
async fn ci_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record_request("/webhook/ci");
    handle_ci_webhook(&state, &webhook_headers(&headers), &body)
        .await
        .into_response()
}
