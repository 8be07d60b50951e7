//! Conversation, message and preview state.
//!
//! All mutation of conversations, their messages and the preview list goes
//! through [`ChatState`], which keeps the following invariants:
//!
//! - message lists are append-only; only whole conversations are removed
//! - a preview exists only once its conversation has a message (unless the
//!   caller opted into an eager preview at creation)
//! - only assistant messages count towards a preview's unread total, and
//!   only that path reorders the preview list

use chrono::Utc;

use crate::config::DEFAULT_MODEL;
use crate::models::{
    ChatPreview, Conversation, DeliveryStatus, Message, NewMessage, Role, PLACEHOLDER_TITLE,
};
use crate::services::ids::generate_id;

const TITLE_MAX_CHARS: usize = 30;
const PREVIEW_MAX_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct ChatState {
    conversations: Vec<Conversation>,
    current_conversation_id: Option<String>,
    is_loading: bool,
    chat_previews: Vec<ChatPreview>,
    selected_model_id: String,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            current_conversation_id: None,
            is_loading: false,
            chat_previews: Vec::new(),
            selected_model_id: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        conversations: Vec<Conversation>,
        chat_previews: Vec<ChatPreview>,
        current_conversation_id: Option<String>,
        selected_model_id: String,
    ) -> Self {
        Self {
            conversations,
            current_conversation_id,
            is_loading: false,
            chat_previews,
            selected_model_id,
        }
    }

    // --- Accessors ---

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn current_conversation_id(&self) -> Option<&str> {
        self.current_conversation_id.as_deref()
    }

    pub fn current_conversation(&self) -> Option<&Conversation> {
        self.current_conversation_id
            .as_deref()
            .and_then(|id| self.conversation(id))
    }

    pub fn is_current(&self, conversation_id: &str) -> bool {
        self.current_conversation_id.as_deref() == Some(conversation_id)
    }

    pub fn previews(&self) -> &[ChatPreview] {
        &self.chat_previews
    }

    pub fn preview(&self, id: &str) -> Option<&ChatPreview> {
        self.chat_previews.iter().find(|p| p.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn selected_model_id(&self) -> &str {
        &self.selected_model_id
    }

    /// Most recent conversation for a contact, if any.
    pub fn conversation_for_contact(&self, contact_id: &str) -> Option<&Conversation> {
        self.conversations
            .iter()
            .filter(|c| c.contact_id == contact_id)
            .max_by_key(|c| c.updated_at)
    }

    // --- Conversation lifecycle ---

    /// Create an empty conversation and make it current. No preview is added
    /// until the first message arrives.
    pub fn create_conversation(&mut self, model_id: Option<&str>, contact_id: Option<&str>) -> String {
        self.insert_conversation(model_id, contact_id, false)
    }

    /// Like [`create_conversation`](Self::create_conversation) but also adds
    /// an empty preview immediately.
    pub fn create_conversation_with_preview(
        &mut self,
        model_id: Option<&str>,
        contact_id: Option<&str>,
    ) -> String {
        self.insert_conversation(model_id, contact_id, true)
    }

    fn insert_conversation(
        &mut self,
        model_id: Option<&str>,
        contact_id: Option<&str>,
        add_to_preview: bool,
    ) -> String {
        let now = Utc::now();
        let model_id = model_id
            .map(str::to_string)
            .unwrap_or_else(|| self.selected_model_id.clone());
        let contact_id = contact_id.map(str::to_string).unwrap_or_else(|| {
            tracing::warn!("Creating conversation without a contact");
            generate_id()
        });

        let conversation = Conversation {
            id: generate_id(),
            contact_id,
            title: PLACEHOLDER_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            model_id: Some(model_id),
            pinned: false,
            muted: false,
            background_image: None,
        };
        let id = conversation.id.clone();

        if add_to_preview {
            self.chat_previews.push(ChatPreview {
                id: id.clone(),
                title: conversation.title.clone(),
                last_message: String::new(),
                timestamp: now,
                unread_count: 0,
                model_id: conversation.model_id.clone(),
                pinned: false,
                muted: false,
            });
        }

        tracing::debug!("Created conversation {} for contact {}", id, conversation.contact_id);
        self.conversations.push(conversation);
        self.current_conversation_id = Some(id.clone());
        id
    }

    /// Make a conversation current; viewing it clears its unread count.
    pub fn select_conversation(&mut self, id: &str) {
        self.current_conversation_id = Some(id.to_string());
        if let Some(preview) = self.preview_mut(id) {
            preview.unread_count = 0;
        }
    }

    pub fn clear_current_conversation(&mut self) {
        self.current_conversation_id = None;
    }

    pub fn update_conversation_title(&mut self, id: &str, title: &str) {
        let Some(conversation) = self.conversation_mut(id) else {
            return;
        };
        conversation.title = title.to_string();
        conversation.updated_at = Utc::now();

        if let Some(preview) = self.preview_mut(id) {
            preview.title = title.to_string();
        }
    }

    /// Remove a conversation and its preview. If it was current, the first
    /// remaining conversation becomes current.
    pub fn delete_conversation(&mut self, id: &str) {
        self.conversations.retain(|c| c.id != id);
        self.chat_previews.retain(|p| p.id != id);

        if self.is_current(id) {
            self.current_conversation_id = self.conversations.first().map(|c| c.id.clone());
        }
        tracing::debug!("Deleted conversation {}", id);
    }

    pub fn toggle_pin_conversation(&mut self, id: &str) {
        let Some(conversation) = self.conversation_mut(id) else {
            return;
        };
        conversation.pinned = !conversation.pinned;
        let pinned = conversation.pinned;

        if let Some(preview) = self.preview_mut(id) {
            preview.pinned = pinned;
        }
    }

    /// Mute lives on the preview only.
    pub fn toggle_mute_conversation(&mut self, id: &str) {
        if let Some(preview) = self.preview_mut(id) {
            preview.muted = !preview.muted;
        }
    }

    pub fn set_selected_model(&mut self, model_id: &str) {
        self.selected_model_id = model_id.to_string();
    }

    pub fn set_loading(&mut self, is_loading: bool) {
        self.is_loading = is_loading;
    }

    // --- Messages ---

    /// Append a message and update the preview. Returns the new message id,
    /// or `None` if the conversation does not exist.
    pub fn add_message(
        &mut self,
        conversation_id: &str,
        message: NewMessage,
        force_unread: bool,
    ) -> Option<String> {
        let is_current = self.is_current(conversation_id);
        let preview_index = self.preview_index(conversation_id);
        let now = Utc::now();

        let conversation = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)?;
        let snippet = truncate_with_ellipsis(&message.content, PREVIEW_MAX_CHARS);
        let derived_title = truncate_with_ellipsis(&message.content, TITLE_MAX_CHARS);
        let is_read = !force_unread && is_current;
        let new_message = Message {
            id: generate_id(),
            content: message.content,
            role: message.role,
            timestamp: now,
            is_read,
            read_timestamp: is_read.then_some(now),
            delivery_status: (message.role == Role::User).then_some(DeliveryStatus::Sent),
        };
        let message_id = new_message.id.clone();

        conversation.messages.push(new_message);
        conversation.updated_at = now;

        let is_first_message = conversation.messages.len() == 1 && message.role == Role::User;

        let Some(index) = preview_index else {
            if is_first_message {
                if conversation.has_placeholder_title() {
                    conversation.title = derived_title;
                }
                let preview = ChatPreview {
                    id: conversation_id.to_string(),
                    title: conversation.title.clone(),
                    last_message: snippet,
                    timestamp: now,
                    unread_count: 0,
                    model_id: conversation.model_id.clone(),
                    pinned: conversation.pinned,
                    muted: false,
                };
                self.chat_previews.insert(0, preview);
            }
            return Some(message_id);
        };

        if is_first_message {
            conversation.title = derived_title.clone();
            self.chat_previews[index].title = derived_title;
        }

        let preview = &mut self.chat_previews[index];
        preview.last_message = snippet;
        preview.timestamp = now;

        if (!is_current || force_unread) && message.role == Role::Assistant {
            preview.unread_count += 1;
            self.promote_to_front(conversation_id);
        }

        Some(message_id)
    }

    /// Move a preview to the head of the list. Only called when a conversation
    /// receives new unread activity.
    pub(crate) fn promote_to_front(&mut self, preview_id: &str) {
        if let Some(index) = self.preview_index(preview_id) {
            let preview = self.chat_previews.remove(index);
            self.chat_previews.insert(0, preview);
        }
    }

    pub fn mark_message_as_read(&mut self, conversation_id: &str, message_id: &str) {
        let Some(message) = self.message_mut(conversation_id, message_id) else {
            return;
        };
        if !message.is_read {
            message.is_read = true;
            message.read_timestamp = Some(Utc::now());
        }
    }

    /// Mark every unread message read; unread user messages also move to
    /// `DeliveryStatus::Read` unless they failed. Clears the preview's unread
    /// count.
    pub fn mark_all_messages_as_read(&mut self, conversation_id: &str) {
        let now = Utc::now();
        let Some(conversation) = self.conversation_mut(conversation_id) else {
            return;
        };

        for message in conversation.messages.iter_mut().filter(|m| !m.is_read) {
            message.is_read = true;
            message.read_timestamp = Some(now);
            let failed = message.delivery_status == Some(DeliveryStatus::Failed);
            if message.role == Role::User && !failed {
                message.delivery_status = Some(DeliveryStatus::Read);
            }
        }

        if let Some(preview) = self.preview_mut(conversation_id) {
            preview.unread_count = 0;
        }
    }

    pub fn update_message_delivery_status(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        status: DeliveryStatus,
    ) {
        let Some(message) = self.message_mut(conversation_id, message_id) else {
            return;
        };
        message.delivery_status = Some(status);

        if status == DeliveryStatus::Read && !message.is_read {
            message.is_read = true;
            message.read_timestamp = Some(Utc::now());
        }
    }

    // --- Internal lookups ---

    fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    fn message_mut(&mut self, conversation_id: &str, message_id: &str) -> Option<&mut Message> {
        self.conversation_mut(conversation_id)?
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
    }

    fn preview_index(&self, id: &str) -> Option<usize> {
        self.chat_previews.iter().position(|p| p.id == id)
    }

    fn preview_mut(&mut self, id: &str) -> Option<&mut ChatPreview> {
        self.chat_previews.iter_mut().find(|p| p.id == id)
    }
}

/// First `max_chars` characters, with `...` appended when anything was cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((boundary, _)) => format!("{}...", &text[..boundary]),
        None => text.to_string(),
    }
}
