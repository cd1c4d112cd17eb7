//! Per-kind request building and response parsing. Dispatch over the closed
//! set of backend kinds is a plain `match`.

pub mod chat_passthrough;
pub mod completion_wrap;
pub mod prompt;
pub mod schema_discovered;

use serde_json::Value;

use crate::router::error::AdapterError;
use crate::router::ir::{NormalizedRequest, NormalizedResponse};
use crate::router::registry::{BackendKind, WorkerDescriptor};

pub use prompt::flatten_prompt;

pub fn build_request(
    worker: &WorkerDescriptor,
    req: &NormalizedRequest,
) -> Result<Value, AdapterError> {
    match worker.kind {
        BackendKind::ChatPassthrough => {
            Ok(chat_passthrough::build_request(req, worker.model.as_deref()))
        }
        BackendKind::CompletionWrap => {
            Ok(completion_wrap::build_request(req, worker.model.as_deref()))
        }
        BackendKind::SchemaDiscovered => {
            let cap = worker
                .capability()
                .ok_or_else(|| AdapterError::new("worker capability is not resolved"))?;
            Ok(schema_discovered::build_request(req, &cap))
        }
    }
}

pub fn parse_response(kind: BackendKind, body: &Value) -> Result<NormalizedResponse, AdapterError> {
    match kind {
        BackendKind::ChatPassthrough => chat_passthrough::parse_response(body),
        BackendKind::CompletionWrap => completion_wrap::parse_response(body),
        BackendKind::SchemaDiscovered => schema_discovered::parse_response(body),
    }
}

/// Shared by the OpenAI-style kinds: `choices[0]`, failing when absent.
pub(crate) fn first_choice(body: &Value) -> Result<&Value, AdapterError> {
    body.get("choices")
        .and_then(|v| v.as_array())
        .ok_or_else(|| AdapterError::new("response has no choices array"))?
        .first()
        .ok_or_else(|| AdapterError::new("response has empty choices"))
}
