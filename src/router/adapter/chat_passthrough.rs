use serde_json::{json, Value};

use crate::router::adapter::first_choice;
use crate::router::error::AdapterError;
use crate::router::ir::{NormalizedRequest, NormalizedResponse};

pub fn build_request(req: &NormalizedRequest, model: Option<&str>) -> Value {
    let messages = req
        .conversation_turns
        .iter()
        .map(|t| {
            json!({
                "role": t.role.as_str(),
                "content": t.text,
            })
        })
        .collect::<Vec<_>>();

    let mut body = json!({
        "messages": messages,
        "max_tokens": req.max_output_tokens,
        "temperature": req.temperature,
    });
    if let Some(m) = model {
        body["model"] = Value::String(m.to_string());
    }
    body
}

pub fn parse_response(body: &Value) -> Result<NormalizedResponse, AdapterError> {
    let content = first_choice(body)?
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| AdapterError::new("first choice has no message content"))?;
    Ok(NormalizedResponse {
        text: content.to_string(),
    })
}
