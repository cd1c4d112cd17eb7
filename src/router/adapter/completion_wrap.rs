use serde_json::{json, Value};

use crate::router::adapter::{first_choice, flatten_prompt};
use crate::router::error::AdapterError;
use crate::router::ir::{NormalizedRequest, NormalizedResponse};

pub fn build_request(req: &NormalizedRequest, model: Option<&str>) -> Value {
    let mut body = json!({
        "prompt": flatten_prompt(&req.conversation_turns),
        "max_tokens": req.max_output_tokens,
        "temperature": req.temperature,
    });
    if let Some(m) = model {
        body["model"] = Value::String(m.to_string());
    }
    body
}

pub fn parse_response(body: &Value) -> Result<NormalizedResponse, AdapterError> {
    let text = first_choice(body)?
        .get("text")
        .and_then(|t| t.as_str())
        .ok_or_else(|| AdapterError::new("first choice has no text"))?;
    Ok(NormalizedResponse {
        text: text.to_string(),
    })
}
