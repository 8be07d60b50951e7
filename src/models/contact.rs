use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role attached to a persona prompt entry. Persona arrays may mix in
/// example turns, so this is wider than the message `Role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::System => "system",
            PromptRole::User => "user",
            PromptRole::Assistant => "assistant",
        }
    }
}

impl From<crate::models::Role> for PromptRole {
    fn from(role: crate::models::Role) -> Self {
        match role {
            crate::models::Role::User => PromptRole::User,
            crate::models::Role::Assistant => PromptRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }
}

/// A persona's system prompt, normalized at the data-entry boundary.
///
/// Accepts a bare string, a single `{role, content}` object, or an array of
/// such objects when deserialized. The bare string keeps its own variant
/// because only an empty string means "no prompt configured".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSystemPrompt", into = "RawSystemPrompt")]
pub enum SystemPrompt {
    Text(String),
    Single(PromptMessage),
    Sequence(Vec<PromptMessage>),
}

impl SystemPrompt {
    pub fn text(content: impl Into<String>) -> Self {
        SystemPrompt::Text(content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        SystemPrompt::Single(PromptMessage::system(content))
    }

    /// Only a bare empty string counts as "no prompt configured"; an object
    /// with empty content is still a configured prompt.
    pub fn is_blank(&self) -> bool {
        matches!(self, SystemPrompt::Text(content) if content.is_empty())
    }

    pub fn to_messages(&self) -> Vec<PromptMessage> {
        match self {
            SystemPrompt::Text(content) => vec![PromptMessage::system(content.clone())],
            SystemPrompt::Single(msg) => vec![msg.clone()],
            SystemPrompt::Sequence(msgs) => msgs.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSystemPrompt {
    Text(String),
    Message(PromptMessage),
    Messages(Vec<PromptMessage>),
}

impl From<RawSystemPrompt> for SystemPrompt {
    fn from(raw: RawSystemPrompt) -> Self {
        match raw {
            RawSystemPrompt::Text(content) => SystemPrompt::Text(content),
            RawSystemPrompt::Message(msg) => SystemPrompt::Single(msg),
            RawSystemPrompt::Messages(msgs) => SystemPrompt::Sequence(msgs),
        }
    }
}

impl From<SystemPrompt> for RawSystemPrompt {
    fn from(prompt: SystemPrompt) -> Self {
        match prompt {
            SystemPrompt::Text(content) => RawSystemPrompt::Text(content),
            SystemPrompt::Single(msg) => RawSystemPrompt::Message(msg),
            SystemPrompt::Sequence(msgs) => RawSystemPrompt::Messages(msgs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSettings {
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub description: String,
    pub system_prompt: SystemPrompt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_settings: Option<AdvancedSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub model_id: String,
    pub avatar: Option<String>,
    pub background_image: Option<String>,
    pub persona: Persona,
    pub last_active: DateTime<Utc>,
    pub is_online: bool,
    pub unread_count: u32,
}
