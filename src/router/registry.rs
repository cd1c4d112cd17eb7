use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::WorkerConfig;
use crate::router::capability::{Capability, CapabilityCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-style chat completions; turns forwarded as messages.
    ChatPassthrough,
    /// OpenAI-style text completions; turns flattened into one prompt.
    CompletionWrap,
    /// KServe v2 / Triton inference; tensor names discovered from the backend.
    SchemaDiscovered,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::ChatPassthrough => "chat_passthrough",
            BackendKind::CompletionWrap => "completion_wrap",
            BackendKind::SchemaDiscovered => "schema_discovered",
        }
    }

    fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            BackendKind::ChatPassthrough => Some("/v1/chat/completions"),
            BackendKind::CompletionWrap => Some("/v1/completions"),
            BackendKind::SchemaDiscovered => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one backend. Immutable after startup except for the capability
/// record, which only the capability resolver replaces.
#[derive(Debug)]
pub struct WorkerDescriptor {
    pub id: usize,
    pub base_url: String,
    pub kind: BackendKind,
    pub model: Option<String>,
    static_endpoint: Option<String>,
    capability: CapabilityCell,
}

impl WorkerDescriptor {
    pub fn new(id: usize, base_url: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            kind,
            model: None,
            static_endpoint: kind.default_endpoint().map(str::to_string),
            capability: CapabilityCell::default(),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }

    /// Overrides the endpoint of statically-routed kinds. Schema-discovered
    /// workers always derive theirs from the resolved model.
    pub fn with_endpoint(mut self, path: Option<String>) -> Self {
        if self.kind != BackendKind::SchemaDiscovered {
            if let Some(p) = path.filter(|p| !p.trim().is_empty()) {
                self.static_endpoint = Some(p);
            }
        }
        self
    }

    pub fn from_config(id: usize, cfg: &WorkerConfig) -> Self {
        Self::new(id, cfg.base_url.clone(), cfg.kind)
            .with_model(cfg.model.clone())
            .with_endpoint(cfg.endpoint_path.clone())
    }

    /// `None` for a schema-discovered worker whose capability is unresolved.
    pub fn endpoint_path(&self) -> Option<String> {
        match self.kind {
            BackendKind::SchemaDiscovered => self.capability().map(|c| c.endpoint_path.clone()),
            _ => self.static_endpoint.clone(),
        }
    }

    pub fn endpoint_url(&self) -> Option<String> {
        self.endpoint_path().map(|p| self.join_url(&p))
    }

    pub fn join_url(&self, path: &str) -> String {
        let mut base = self.base_url.trim_end_matches('/').to_string();
        base.push('/');
        base.push_str(path.trim_start_matches('/'));
        base
    }

    pub fn capability(&self) -> Option<std::sync::Arc<Capability>> {
        self.capability.snapshot()
    }

    pub fn is_resolved(&self) -> bool {
        match self.kind {
            BackendKind::SchemaDiscovered => self.capability.is_valid(),
            _ => true,
        }
    }

    pub(crate) fn capability_cell(&self) -> &CapabilityCell {
        &self.capability
    }
}

/// Fixed, ordered set of workers built once at startup.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Vec<WorkerDescriptor>,
}

impl WorkerRegistry {
    pub fn new(workers: Vec<WorkerDescriptor>) -> Self {
        Self { workers }
    }

    pub fn from_config(workers: &[WorkerConfig]) -> Result<Self> {
        if workers.is_empty() {
            bail!("worker registry is empty");
        }
        Ok(Self::new(
            workers
                .iter()
                .enumerate()
                .map(|(id, cfg)| WorkerDescriptor::from_config(id, cfg))
                .collect(),
        ))
    }

    pub fn list(&self) -> &[WorkerDescriptor] {
        &self.workers
    }

    pub fn get(&self, id: usize) -> Option<&WorkerDescriptor> {
        self.workers.get(id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
