use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;

/// Title every conversation carries until its first user message names it.
pub const PLACEHOLDER_TITLE: &str = "새 대화";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub contact_id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub model_id: Option<String>,
    pub pinned: bool,
    pub muted: bool,
    pub background_image: Option<String>,
}

impl Conversation {
    pub fn has_placeholder_title(&self) -> bool {
        self.title == PLACEHOLDER_TITLE
    }
}

/// Denormalized list entry for a conversation that has at least one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPreview {
    pub id: String,
    pub title: String,
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
    pub unread_count: u32,
    pub model_id: Option<String>,
    pub pinned: bool,
    pub muted: bool,
}
