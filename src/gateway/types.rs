//! Public request/response schemas / 公共请求与响应结构

use serde::{Deserialize, Serialize};

use crate::router::ir::{ConversationTurn, NormalizedRequest, Role};

fn default_max_new_tokens() -> u32 {
    64
}

fn default_max_tokens() -> u32 {
    128
}

fn default_temperature() -> f32 {
    0.7
}

/// Legacy single-prompt request / 旧版单提示请求
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl From<GenerateRequest> for NormalizedRequest {
    fn from(r: GenerateRequest) -> Self {
        NormalizedRequest {
            conversation_turns: vec![ConversationTurn::new(Role::User, r.prompt)],
            max_output_tokens: r.max_new_tokens,
            temperature: r.temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// OpenAI-style chat request / OpenAI风格的聊天请求
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl ChatCompletionRequest {
    pub fn to_normalized(&self) -> NormalizedRequest {
        NormalizedRequest {
            conversation_turns: self
                .messages
                .iter()
                .map(|m| ConversationTurn::new(m.role, m.content.clone()))
                .collect(),
            max_output_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
}

impl ChatCompletionResponse {
    pub fn single(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatMessage {
                    role: Role::Assistant,
                    content: text.into(),
                },
                finish_reason: "stop".to_string(),
            }],
        }
    }
}
