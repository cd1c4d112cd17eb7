use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::router::error::DiscoveryError;
use crate::router::metrics::RouterMetrics;
use crate::router::registry::{BackendKind, WorkerDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorField {
    pub name: String,
    pub dtype: String,
}

impl TensorField {
    /// Model configs declare `TYPE_STRING`, `TYPE_FP32`, ...; the inference
    /// protocol expects `BYTES`, `FP32`, ...
    pub fn wire_datatype(&self) -> String {
        match self.dtype.strip_prefix("TYPE_") {
            Some("STRING") => "BYTES".to_string(),
            Some(rest) => rest.to_string(),
            None => self.dtype.clone(),
        }
    }
}

/// Discovered schema of a schema-driven backend. Only ever constructed
/// complete; there is no partially-valid capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capability {
    pub model_name: String,
    pub input: TensorField,
    pub output: TensorField,
    pub endpoint_path: String,
    pub resolved_at: DateTime<Utc>,
}

impl Capability {
    pub fn new(
        model_name: impl Into<String>,
        input: TensorField,
        output: TensorField,
    ) -> Result<Self, DiscoveryError> {
        let model_name = model_name.into();
        Ok(Self {
            endpoint_path: model_path(&model_name, "infer")?,
            model_name,
            input,
            output,
            resolved_at: Utc::now(),
        })
    }
}

/// `/v2/models/<model>/<action>` with the model name escaped as a single
/// path segment, so names like `org/model` or `llama#v2` stay intact.
pub(crate) fn model_path(model: &str, action: &str) -> Result<String, DiscoveryError> {
    let invalid = || DiscoveryError::InvalidModelName {
        model: model.to_string(),
    };
    let mut url = Url::parse("http://localhost/").map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .clear()
        .extend(["v2", "models", model, action]);
    Ok(url.path().to_string())
}

#[derive(Debug, Clone, Default)]
pub enum CapabilityState {
    #[default]
    Unresolved,
    Resolved(Arc<Capability>),
}

/// Per-worker capability slot. Readers see either the previous record or the
/// new one, never a mix.
#[derive(Debug, Default)]
pub struct CapabilityCell {
    state: RwLock<CapabilityState>,
}

impl CapabilityCell {
    pub fn snapshot(&self) -> Option<Arc<Capability>> {
        match &*self.state.read() {
            CapabilityState::Resolved(c) => Some(c.clone()),
            CapabilityState::Unresolved => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(&*self.state.read(), CapabilityState::Resolved(_))
    }

    /// Replaces the whole record. Concurrent resolutions race; the last
    /// writer wins.
    pub fn commit(&self, capability: Capability) -> Arc<Capability> {
        let capability = Arc::new(capability);
        *self.state.write() = CapabilityState::Resolved(capability.clone());
        capability
    }
}

#[derive(Debug, Deserialize)]
struct ModelIndexResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelEntry {
    Name(String),
    Object { name: String },
}

impl ModelEntry {
    fn into_name(self) -> String {
        match self {
            ModelEntry::Name(n) => n,
            ModelEntry::Object { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelConfigResponse {
    #[serde(default)]
    input: Vec<TensorDecl>,
    #[serde(default)]
    output: Vec<TensorDecl>,
}

#[derive(Debug, Deserialize)]
struct TensorDecl {
    name: Option<String>,
    data_type: Option<String>,
}

impl TensorDecl {
    fn into_field(self, default_name: &str) -> TensorField {
        TensorField {
            name: self
                .name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| default_name.to_string()),
            dtype: self
                .data_type
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "BYTES".to_string()),
        }
    }
}

/// Discovers and caches capabilities of schema-discovered workers.
/// Re-resolution is lazy: an unresolved worker is retried on its next `ensure`.
#[derive(Debug, Clone)]
pub struct CapabilityResolver {
    timeout: Duration,
}

impl CapabilityResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// No-op for resolved workers and statically-routed kinds. On failure the
    /// previous state is left untouched.
    pub async fn ensure(&self, worker: &WorkerDescriptor) -> Result<(), DiscoveryError> {
        if worker.kind != BackendKind::SchemaDiscovered || worker.capability_cell().is_valid() {
            return Ok(());
        }

        info!(worker_id = worker.id, url = %worker.base_url, "resolving worker capability");
        match self.discover(worker).await {
            Ok(capability) => {
                let cap = worker.capability_cell().commit(capability);
                RouterMetrics::set_worker_health(worker.id, true);
                info!(
                    worker_id = worker.id,
                    model = %cap.model_name,
                    endpoint = %cap.endpoint_path,
                    input = %cap.input.name,
                    output = %cap.output.name,
                    "worker capability resolved"
                );
                Ok(())
            }
            Err(e) => {
                RouterMetrics::set_worker_health(worker.id, false);
                warn!(worker_id = worker.id, url = %worker.base_url, error = %e, "capability discovery failed");
                Err(e)
            }
        }
    }

    /// Resolves every schema-discovered worker once; failures are logged only.
    pub async fn warm_up(&self, workers: &[WorkerDescriptor]) -> usize {
        let mut resolved = 0usize;
        for w in workers.iter().filter(|w| w.kind == BackendKind::SchemaDiscovered) {
            if self.ensure(w).await.is_ok() {
                resolved += 1;
            }
        }
        resolved
    }

    async fn discover(&self, worker: &WorkerDescriptor) -> Result<Capability, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DiscoveryError::Transport {
                url: worker.base_url.clone(),
                message: e.to_string(),
            })?;

        let index_url = worker.join_url("v2/models");
        let index: ModelIndexResponse = get_json(&client, &index_url).await?;
        let models: Vec<String> = index
            .models
            .into_iter()
            .map(ModelEntry::into_name)
            .filter(|s| !s.trim().is_empty())
            .collect();
        debug!(worker_id = worker.id, models = ?models, "listed backend models");

        // First listed model wins; no scoring.
        let model = models.into_iter().next().ok_or(DiscoveryError::NoModels)?;

        let config_url = worker.join_url(&model_path(&model, "config")?);
        let config: ModelConfigResponse = get_json(&client, &config_url).await?;

        let input = config
            .input
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::MissingTensor {
                model: model.clone(),
                direction: "input",
            })?
            .into_field("INPUT");
        let output = config
            .output
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::MissingTensor {
                model: model.clone(),
                direction: "output",
            })?
            .into_field("OUTPUT");

        Capability::new(model, input, output)
    }
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, DiscoveryError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| DiscoveryError::from_reqwest(url, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(DiscoveryError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = resp
        .bytes()
        .await
        .map_err(|e| DiscoveryError::from_reqwest(url, e))?;
    serde_json::from_slice(&body).map_err(|e| DiscoveryError::InvalidBody {
        url: url.to_string(),
        message: e.to_string(),
    })
}
