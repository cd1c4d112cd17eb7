#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Request counters shared with a running mock backend.
#[derive(Clone, Default)]
pub struct Hits {
    pub index: Arc<AtomicUsize>,
    pub config: Arc<AtomicUsize>,
    pub infer: Arc<AtomicUsize>,
    /// Decoded `{model}` path segments seen by the inference route.
    pub infer_models: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl Hits {
    pub fn infer(&self) -> usize {
        self.infer.load(Ordering::SeqCst)
    }

    pub fn index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    pub fn infer_models(&self) -> Vec<String> {
        self.infer_models.lock().clone()
    }
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// OpenAI-style completions backend answering `text`.
pub async fn start_completion_backend(text: &str) -> (String, Hits) {
    let hits = Hits::default();
    let text = text.to_string();
    let app = Router::new()
        .route(
            "/v1/completions",
            post(|State((hits, text)): State<(Hits, String)>, Json(_b): Json<Value>| async move {
                hits.infer.fetch_add(1, Ordering::SeqCst);
                Json(json!({"choices": [{"index": 0, "text": text}]}))
            }),
        )
        .with_state((hits.clone(), text));
    (serve(app).await, hits)
}

/// OpenAI-style chat backend answering `text`.
pub async fn start_chat_backend(text: &str) -> (String, Hits) {
    let hits = Hits::default();
    let text = text.to_string();
    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(|State((hits, text)): State<(Hits, String)>, Json(_b): Json<Value>| async move {
                hits.infer.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
                }))
            }),
        )
        .with_state((hits.clone(), text));
    (serve(app).await, hits)
}

/// Triton-style backend listing `models`; inference echoes the prompt back
/// prefixed with `echo:`.
pub async fn start_triton_backend(models: Value) -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route(
            "/v2/models",
            get(|State((hits, models)): State<(Hits, Value)>| async move {
                hits.index.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "models": models }))
            }),
        )
        .route(
            "/v2/models/{model}/config",
            get(|State((hits, _)): State<(Hits, Value)>| async move {
                hits.config.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "input": [{"name": "INPUT", "data_type": "BYTES"}],
                    "output": [{"name": "OUTPUT", "data_type": "BYTES"}]
                }))
            }),
        )
        .route(
            "/v2/models/{model}/infer",
            post(|State((hits, _)): State<(Hits, Value)>,
                  Path(model): Path<String>,
                  Json(b): Json<Value>| async move {
                hits.infer.fetch_add(1, Ordering::SeqCst);
                hits.infer_models.lock().push(model);
                let prompt = b["inputs"][0]["data"][0].as_str().unwrap_or("").to_string();
                Json(json!({
                    "outputs": [{
                        "name": b["outputs"][0]["name"],
                        "datatype": "BYTES",
                        "shape": [1],
                        "data": [format!("echo:{}", prompt)]
                    }]
                }))
            }),
        )
        .with_state((hits.clone(), models));
    (serve(app).await, hits)
}
