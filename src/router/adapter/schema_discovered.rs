use serde_json::{json, Value};

use crate::router::adapter::flatten_prompt;
use crate::router::capability::Capability;
use crate::router::error::AdapterError;
use crate::router::ir::{NormalizedRequest, NormalizedResponse};

/// One BYTES-like input tensor holding the flattened prompt and one requested
/// output. Generation parameters are not part of the v2 tensor request.
pub fn build_request(req: &NormalizedRequest, cap: &Capability) -> Value {
    json!({
        "inputs": [
            {
                "name": cap.input.name,
                "shape": [1],
                "datatype": cap.input.wire_datatype(),
                "data": [flatten_prompt(&req.conversation_turns)],
            }
        ],
        "outputs": [
            { "name": cap.output.name }
        ],
    })
}

pub fn parse_response(body: &Value) -> Result<NormalizedResponse, AdapterError> {
    let first_output = body
        .get("outputs")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| AdapterError::new("response has no outputs"))?;

    let item = match first_output.get("data") {
        Some(Value::Array(items)) => items.first(),
        Some(v) => Some(v),
        None => None,
    }
    .ok_or_else(|| AdapterError::new("first output has no data"))?;

    // Scalars only; null and nested values are not an answer.
    let text = match item {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => return Err(AdapterError::new("first output element is null")),
        Value::Array(_) | Value::Object(_) => {
            return Err(AdapterError::new("first output element is not a scalar"))
        }
    };
    Ok(NormalizedResponse { text })
}
