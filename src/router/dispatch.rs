use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::router::adapter;
use crate::router::capability::CapabilityResolver;
use crate::router::error::DispatchError;
use crate::router::ir::{NormalizedRequest, NormalizedResponse};
use crate::router::metrics::RouterMetrics;
use crate::router::registry::{BackendKind, WorkerDescriptor, WorkerRegistry};
use crate::router::selector::{self, RoundRobinCursor};

/// Composes selection, capability resolution, request adaptation, the
/// outbound call and failure classification. Nothing on this path retries.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<WorkerRegistry>,
    resolver: CapabilityResolver,
    cursor: RoundRobinCursor,
    generation_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<WorkerRegistry>, config: &DispatchConfig) -> Self {
        Self::with_timeouts(
            registry,
            config.discovery_timeout(),
            config.generation_timeout(),
        )
    }

    pub fn with_timeouts(
        registry: Arc<WorkerRegistry>,
        discovery_timeout: Duration,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            resolver: CapabilityResolver::new(discovery_timeout),
            cursor: RoundRobinCursor::new(),
            generation_timeout,
        }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn cursor_position(&self) -> u64 {
        self.cursor.current()
    }

    /// Resolves schema-discovered workers ahead of traffic. Unresolved workers
    /// are retried lazily by `dispatch`.
    pub async fn warm_up(&self) -> usize {
        self.resolver.warm_up(self.registry.list()).await
    }

    pub async fn dispatch(
        &self,
        req: &NormalizedRequest,
    ) -> Result<NormalizedResponse, DispatchError> {
        let request_id = format!("req_{}", Uuid::new_v4().simple());
        let started = Instant::now();
        RouterMetrics::record_request();

        let ticket = self.cursor.advance();
        let (worker, _) = selector::pick(self.registry.list(), ticket).map_err(|e| {
            warn!(request_id = %request_id, error = %e, "dispatch failed");
            e
        })?;
        info!(
            request_id = %request_id,
            worker_id = worker.id,
            kind = %worker.kind,
            url = %worker.base_url,
            turns = req.conversation_turns.len(),
            max_tokens = req.max_output_tokens,
            "selected worker"
        );

        match self.dispatch_to(worker, req, &request_id).await {
            Ok(resp) => {
                RouterMetrics::record_latency(started.elapsed());
                RouterMetrics::set_worker_health(worker.id, true);
                info!(
                    request_id = %request_id,
                    worker_id = worker.id,
                    latency_ms = started.elapsed().as_millis() as u64,
                    output_len = resp.text.len(),
                    "dispatch completed"
                );
                Ok(resp)
            }
            Err(e) => {
                RouterMetrics::set_worker_health(worker.id, false);
                warn!(
                    request_id = %request_id,
                    worker_id = worker.id,
                    code = e.code(),
                    error = %e,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "dispatch failed"
                );
                Err(e)
            }
        }
    }

    async fn dispatch_to(
        &self,
        worker: &WorkerDescriptor,
        req: &NormalizedRequest,
        request_id: &str,
    ) -> Result<NormalizedResponse, DispatchError> {
        if worker.kind == BackendKind::SchemaDiscovered && !worker.is_resolved() {
            warn!(request_id = %request_id, worker_id = worker.id, "worker unresolved, attempting discovery");
            self.resolver
                .ensure(worker)
                .await
                .map_err(|e| DispatchError::BackendUnavailable {
                    worker_id: worker.id,
                    reason: e.to_string(),
                })?;
        }

        let url = worker
            .endpoint_url()
            .ok_or_else(|| DispatchError::BackendUnavailable {
                worker_id: worker.id,
                reason: "worker has no endpoint".to_string(),
            })?;
        let payload = adapter::build_request(worker, req).map_err(|e| {
            DispatchError::BackendUnavailable {
                worker_id: worker.id,
                reason: e.reason,
            }
        })?;

        debug!(request_id = %request_id, url = %url, "sending request to worker");
        let body = self.post_json(&url, &payload).await?;

        let resp = adapter::parse_response(worker.kind, &body)?;
        if resp.text.is_empty() {
            return Err(DispatchError::EmptyOrMalformedUpstreamResponse {
                reason: "backend returned empty text".to_string(),
            });
        }
        Ok(resp)
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(self.generation_timeout)
            .build()
            .map_err(|e| DispatchError::TransportError {
                cause: error_chain(&e),
            })?;

        let resp = client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DispatchError::UpstreamHttpError {
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| self.classify(e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            DispatchError::EmptyOrMalformedUpstreamResponse {
                reason: format!("invalid JSON body: {}", e),
            }
        })
    }

    fn classify(&self, e: reqwest::Error) -> DispatchError {
        if e.is_timeout() {
            DispatchError::UpstreamTimeout {
                timeout_ms: self.generation_timeout.as_millis() as u64,
            }
        } else {
            DispatchError::TransportError {
                cause: error_chain(&e),
            }
        }
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut src = e.source();
    while let Some(s) = src {
        out.push_str(": ");
        out.push_str(&s.to_string());
        src = s.source();
    }
    out
}
