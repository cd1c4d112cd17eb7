use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Lower-case wire name used by chat-completion backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Upper-case tag used when a conversation is flattened into a prompt.
    pub fn tag(&self) -> &'static str {
        match self {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Backend-agnostic request the dispatch core operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRequest {
    pub conversation_turns: Vec<ConversationTurn>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl NormalizedRequest {
    pub fn new(conversation_turns: Vec<ConversationTurn>) -> Self {
        Self {
            conversation_turns,
            max_output_tokens: 64,
            temperature: 0.7,
        }
    }

    pub fn single_prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![ConversationTurn::new(Role::User, prompt)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub text: String,
}
