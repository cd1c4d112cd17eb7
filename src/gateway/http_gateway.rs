//! HTTP gateway implementation for the router
//! 路由器的HTTP网关实现

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};
use tracing::{info, warn};

use crate::config::RouterConfig;
use crate::gateway::types::{
    ChatCompletionRequest, ChatCompletionResponse, GenerateRequest, GenerateResponse,
};
use crate::router::dispatch::Dispatcher;
use crate::router::error::DispatchError;
use crate::router::ir::NormalizedRequest;

/// HTTP gateway server / HTTP网关服务器
pub struct HttpGateway {
    config: Arc<RouterConfig>,
    dispatcher: Arc<Dispatcher>,
    metrics: Option<PrometheusHandle>,
}

/// Application state / 应用状态
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<RouterConfig>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) metrics: Option<PrometheusHandle>,
}

pub(crate) fn build_router(state: AppState) -> Router {
    // Outer bound: worst case is one discovery plus one generation call.
    let request_timeout = state.config.dispatch.discovery_timeout()
        + state.config.dispatch.generation_timeout()
        + Duration::from_secs(1);
    let cors_enabled = state.config.http.cors_enabled;

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/debug", get(debug_state))
        .route("/metrics", get(render_metrics))
        .route("/route_generate", post(route_generate))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state);

    if cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

impl HttpGateway {
    /// Create new HTTP gateway / 创建新的HTTP网关
    pub fn new(config: Arc<RouterConfig>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            metrics: None,
        }
    }

    /// Serve `/metrics` from this handle / 通过该句柄提供`/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Start HTTP gateway with shutdown signal / 使用关闭信号启动HTTP网关
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self.config.http.addr;
        let app = build_router(AppState {
            config: self.config.clone(),
            dispatcher: self.dispatcher.clone(),
            metrics: self.metrics.clone(),
        });

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("HTTP gateway listening on {}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Front door error / 入口错误
#[derive(Debug)]
pub(crate) enum ApiError {
    Dispatch(DispatchError),
    Unauthorized(&'static str),
    Forbidden,
    BadRequest(String),
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        ApiError::Dispatch(e)
    }
}

pub(crate) fn status_for(e: &DispatchError) -> StatusCode {
    match e {
        DispatchError::NoWorkersAvailable | DispatchError::BackendUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DispatchError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        DispatchError::UpstreamHttpError { .. }
        | DispatchError::EmptyOrMalformedUpstreamResponse { .. }
        | DispatchError::TransportError { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Dispatch(e) => (status_for(&e), e.code(), e.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.to_string()),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "Invalid API key".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
        };
        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            })),
        )
            .into_response()
    }
}

fn check_api_key(expected: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(ApiError::Unauthorized(
            "Missing or invalid Authorization header",
        ))?;
    if token != expected {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Health check endpoint / 健康检查端点
/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let workers = state
        .dispatcher
        .registry()
        .list()
        .iter()
        .map(|w| {
            let cap = w.capability();
            json!({
                "id": w.id,
                "kind": w.kind,
                "url": w.base_url,
                "endpoint": w.endpoint_path(),
                "resolved": w.is_resolved(),
                "model_name": cap.as_ref().map(|c| c.model_name.clone()),
                "resolved_at": cap.as_ref().map(|c| c.resolved_at.to_rfc3339()),
            })
        })
        .collect::<Vec<_>>();

    Json(json!({
        "status": "ok",
        "worker_count": workers.len(),
        "workers": workers,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Detailed runtime state / 详细运行时状态
/// GET /debug
async fn debug_state(State(state): State<AppState>) -> Json<serde_json::Value> {
    let workers = state
        .dispatcher
        .registry()
        .list()
        .iter()
        .map(|w| {
            json!({
                "id": w.id,
                "kind": w.kind,
                "url": w.base_url,
                "model": w.model,
                "endpoint": w.endpoint_path(),
                "capability": w.capability().map(|c| (*c).clone()),
            })
        })
        .collect::<Vec<_>>();
    info!("Debug endpoint accessed");

    Json(json!({
        "workers": workers,
        "worker_count": workers.len(),
        "rr_cursor": state.dispatcher.cursor_position(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Prometheus exposition / Prometheus指标导出
/// GET /metrics
async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Legacy single-prompt generation / 旧版单提示生成
/// POST /route_generate
async fn route_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    if req.prompt.is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }
    let normalized: NormalizedRequest = req.into();
    let resp = state.dispatcher.dispatch(&normalized).await?;
    Ok(Json(GenerateResponse { output: resp.text }))
}

/// GET /v1/models
async fn list_models(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "object": "list",
        "data": [
            {
                "id": state.config.gateway.public_model_name,
                "object": "model",
                "owned_by": "local",
            }
        ],
    }))
}

/// OpenAI-compatible chat completions / OpenAI兼容的聊天补全
/// POST /v1/chat/completions
async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatCompletionRequest>,
) -> Result<Json<ChatCompletionResponse>, ApiError> {
    check_api_key(state.config.gateway.api_key.as_deref(), &headers).map_err(|e| {
        warn!("rejected chat completion request: {:?}", e);
        e
    })?;
    if req.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".to_string()));
    }

    let resp = state.dispatcher.dispatch(&req.to_normalized()).await?;
    Ok(Json(ChatCompletionResponse::single(req.model, resp.text)))
}
