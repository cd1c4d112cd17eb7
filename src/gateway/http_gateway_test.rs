//! Tests for HTTP gateway module
//! HTTP网关模块的测试

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

use crate::config::{RouterConfig, WorkerConfig};
use crate::gateway::http_gateway::{build_router, status_for, AppState};
use crate::router::capability::{Capability, TensorField};
use crate::router::dispatch::Dispatcher;
use crate::router::metrics::{build_recorder, RouterMetrics};
use crate::router::error::DispatchError;
use crate::router::registry::{BackendKind, WorkerRegistry};

async fn start_completion_backend(status: StatusCode, body: Value) -> String {
    let app = Router::new().route(
        "/v1/completions",
        post(move |Json(_req): Json<Value>| {
            let b = body.clone();
            async move { (status, Json(b)) }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Create test app over the given workers / 基于给定worker创建测试应用
fn create_test_app(workers: Vec<WorkerConfig>, api_key: Option<&str>) -> Router {
    let mut config = RouterConfig {
        workers,
        ..Default::default()
    };
    config.dispatch.discovery_timeout_ms = 500;
    config.dispatch.generation_timeout_ms = 2_000;
    config.gateway.api_key = api_key.map(str::to_string);

    let registry = Arc::new(WorkerRegistry::from_config(&config.workers).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(registry, &config.dispatch));
    build_router(AppState {
        config: Arc::new(config),
        dispatcher,
        metrics: None,
    })
}

fn worker(base_url: String, kind: BackendKind) -> WorkerConfig {
    WorkerConfig {
        base_url,
        kind,
        endpoint_path: None,
        model: Some("qwen2.5-0.5b".to_string()),
    }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let v = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, v)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn chat_body() -> Value {
    json!({
        "model": "qwen2.5-0.5b",
        "messages": [
            {"role": "system", "content": "be terse"},
            {"role": "user", "content": "2+2?"}
        ],
        "max_tokens": 8
    })
}

#[tokio::test]
async fn test_health_lists_workers() {
    let app = create_test_app(
        vec![
            worker("http://a:8000".to_string(), BackendKind::CompletionWrap),
            worker("http://b:8000".to_string(), BackendKind::SchemaDiscovered),
        ],
        None,
    );
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["worker_count"], 2);
    assert_eq!(body["workers"][0]["endpoint"], "/v1/completions");
    assert_eq!(body["workers"][1]["kind"], "schema_discovered");
    assert_eq!(body["workers"][1]["resolved"], false);
    assert!(body["workers"][1]["endpoint"].is_null());
    assert!(body["workers"][1]["resolved_at"].is_null());
}

#[tokio::test]
async fn test_health_reports_resolution_time() {
    let config = RouterConfig {
        workers: vec![worker("http://t:8000".to_string(), BackendKind::SchemaDiscovered)],
        ..Default::default()
    };
    let registry = Arc::new(WorkerRegistry::from_config(&config.workers).unwrap());
    let cap = Capability::new(
        "ensemble",
        TensorField {
            name: "INPUT".to_string(),
            dtype: "BYTES".to_string(),
        },
        TensorField {
            name: "OUTPUT".to_string(),
            dtype: "BYTES".to_string(),
        },
    )
    .unwrap();
    let resolved_at = cap.resolved_at;
    registry.get(0).unwrap().capability_cell().commit(cap);

    let app = build_router(AppState {
        dispatcher: Arc::new(Dispatcher::new(registry, &config.dispatch)),
        config: Arc::new(config),
        metrics: None,
    });
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["workers"][0]["resolved"], true);
    assert_eq!(body["workers"][0]["model_name"], "ensemble");
    assert_eq!(body["workers"][0]["resolved_at"], resolved_at.to_rfc3339());
}

#[tokio::test]
async fn test_metrics_endpoint_renders_prometheus_text() {
    let recorder = build_recorder().unwrap();
    metrics::with_local_recorder(&recorder, RouterMetrics::record_request);

    let config = RouterConfig::default();
    let registry = Arc::new(WorkerRegistry::from_config(&config.workers).unwrap());
    let app = build_router(AppState {
        dispatcher: Arc::new(Dispatcher::new(registry, &config.dispatch)),
        config: Arc::new(config),
        metrics: Some(recorder.handle()),
    });

    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("router_requests_total 1"), "{}", text);
}

#[tokio::test]
async fn test_metrics_endpoint_without_recorder_is_not_found() {
    let app = create_test_app(
        vec![worker("http://a:8000".to_string(), BackendKind::CompletionWrap)],
        None,
    );
    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_route_generate_returns_output() {
    let url = start_completion_backend(StatusCode::OK, json!({"choices": [{"text": "4"}]})).await;
    let app = create_test_app(vec![worker(url, BackendKind::CompletionWrap)], None);
    let (status, body) = send(app, post_json("/route_generate", json!({"prompt": "2+2?"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"output": "4"}));
}

#[tokio::test]
async fn test_route_generate_rejects_empty_prompt() {
    let app = create_test_app(
        vec![worker("http://a:8000".to_string(), BackendKind::CompletionWrap)],
        None,
    );
    let (status, body) = send(app, post_json("/route_generate", json!({"prompt": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_chat_completions_openai_shape() {
    let url = start_completion_backend(StatusCode::OK, json!({"choices": [{"text": "4"}]})).await;
    let app = create_test_app(vec![worker(url, BackendKind::CompletionWrap)], None);
    let (status, body) = send(app, post_json("/v1/chat/completions", chat_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "qwen2.5-0.5b");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "4");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn test_chat_completions_api_key() {
    let url = start_completion_backend(StatusCode::OK, json!({"choices": [{"text": "4"}]})).await;
    let workers = vec![worker(url, BackendKind::CompletionWrap)];

    let app = create_test_app(workers.clone(), Some("sekret"));
    let (status, _) = send(app, post_json("/v1/chat/completions", chat_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let app = create_test_app(workers.clone(), Some("sekret"));
    let mut req = post_json("/v1/chat/completions", chat_body());
    req.headers_mut()
        .insert("authorization", "Bearer wrong".parse().unwrap());
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let app = create_test_app(workers, Some("sekret"));
    let mut req = post_json("/v1/chat/completions", chat_body());
    req.headers_mut()
        .insert("authorization", "Bearer sekret".parse().unwrap());
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_upstream_http_error_maps_to_bad_gateway() {
    let url =
        start_completion_backend(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "x"})).await;
    let app = create_test_app(vec![worker(url, BackendKind::CompletionWrap)], None);
    let (status, body) = send(app, post_json("/route_generate", json!({"prompt": "hi"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_http_error");
}

#[tokio::test]
async fn test_unresolvable_schema_worker_maps_to_service_unavailable() {
    let app = create_test_app(
        vec![worker(closed_port_url().await, BackendKind::SchemaDiscovered)],
        None,
    );
    let (status, body) = send(app, post_json("/route_generate", json!({"prompt": "hi"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "backend_unavailable");
}

#[tokio::test]
async fn test_models_and_debug() {
    let app = create_test_app(
        vec![worker("http://a:8000".to_string(), BackendKind::ChatPassthrough)],
        None,
    );
    let req = Request::builder().uri("/v1/models").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], "qwen2.5-0.5b");

    let req = Request::builder().uri("/debug").body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rr_cursor"], 0);
    assert_eq!(body["workers"][0]["model"], "qwen2.5-0.5b");
    assert!(body["workers"][0]["capability"].is_null());
}

#[test]
fn test_status_mapping() {
    assert_eq!(
        status_for(&DispatchError::NoWorkersAvailable),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        status_for(&DispatchError::UpstreamTimeout { timeout_ms: 1 }),
        StatusCode::GATEWAY_TIMEOUT
    );
    assert_eq!(
        status_for(&DispatchError::TransportError {
            cause: "reset".to_string()
        }),
        StatusCode::BAD_GATEWAY
    );
}
