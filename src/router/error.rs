use thiserror::Error;

/// Classified outcome of a failed dispatch. Returned to the caller, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no workers available")]
    NoWorkersAvailable,

    #[error("backend unavailable: worker {worker_id}: {reason}")]
    BackendUnavailable { worker_id: usize, reason: String },

    #[error("upstream timeout after {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    #[error("upstream HTTP error: status {status}")]
    UpstreamHttpError { status: u16 },

    #[error("empty or malformed upstream response: {reason}")]
    EmptyOrMalformedUpstreamResponse { reason: String },

    #[error("transport error: {cause}")]
    TransportError { cause: String },
}

impl DispatchError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::NoWorkersAvailable => "no_workers_available",
            DispatchError::BackendUnavailable { .. } => "backend_unavailable",
            DispatchError::UpstreamTimeout { .. } => "upstream_timeout",
            DispatchError::UpstreamHttpError { .. } => "upstream_http_error",
            DispatchError::EmptyOrMalformedUpstreamResponse { .. } => {
                "empty_or_malformed_upstream_response"
            }
            DispatchError::TransportError { .. } => "transport_error",
        }
    }
}

impl From<AdapterError> for DispatchError {
    fn from(e: AdapterError) -> Self {
        DispatchError::EmptyOrMalformedUpstreamResponse { reason: e.reason }
    }
}

/// A backend body could not be built or an expected field was absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("adapter error: {reason}")]
pub struct AdapterError {
    pub reason: String,
}

impl AdapterError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery timeout: {url}")]
    Timeout { url: String },

    #[error("discovery transport error: {url}: {message}")]
    Transport { url: String, message: String },

    #[error("discovery HTTP error: {url}: status {status}")]
    Status { url: String, status: u16 },

    #[error("discovery response is not valid JSON: {url}: {message}")]
    InvalidBody { url: String, message: String },

    #[error("backend lists no models")]
    NoModels,

    #[error("model name cannot form a URL path: {model}")]
    InvalidModelName { model: String },

    #[error("model {model} declares no {direction} tensors")]
    MissingTensor {
        model: String,
        direction: &'static str,
    },
}

impl DiscoveryError {
    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DiscoveryError::Timeout {
                url: url.to_string(),
            }
        } else {
            DiscoveryError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}
