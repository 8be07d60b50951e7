use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::models::{DeliveryStatus, NewMessage, PromptMessage, Role};
use crate::providers::{CompletionProvider, CompletionRequest, ProviderError};
use crate::services::contacts::ContactStore;
use crate::services::conversation::ChatState;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Sent message could not be located")]
    MessageNotFound,

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Everything the front end mutates: conversations, previews and contacts.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub chat: ChatState,
    pub contacts: ContactStore,
}

/// A send that has been recorded locally and is waiting on the provider.
#[derive(Debug, Clone)]
pub struct PendingReply {
    pub conversation_id: String,
    pub user_message_id: String,
    pub request: CompletionRequest,
}

/// Ids of both sides of a completed exchange.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub user_message_id: String,
    pub reply_message_id: String,
    pub reply: String,
}

/// First half of a send: record the user message, mark it delivered, raise
/// the loading flag and build the provider request from the conversation's
/// full history.
pub fn begin_send(
    state: &mut AppState,
    conversation_id: &str,
    content: &str,
) -> Result<PendingReply, ChatError> {
    if state.chat.conversation(conversation_id).is_none() {
        return Err(ChatError::ConversationNotFound(conversation_id.to_string()));
    }

    state
        .chat
        .add_message(conversation_id, NewMessage::user(content), false);

    let conversation = state
        .chat
        .conversation(conversation_id)
        .ok_or_else(|| ChatError::ConversationNotFound(conversation_id.to_string()))?;

    // Latest user message by timestamp; ties resolve to the later entry.
    let user_message_id = conversation
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .max_by_key(|m| m.timestamp)
        .map(|m| m.id.clone())
        .ok_or(ChatError::MessageNotFound)?;

    let history: Vec<PromptMessage> = conversation
        .messages
        .iter()
        .map(|m| PromptMessage {
            role: m.role.into(),
            content: m.content.clone(),
        })
        .collect();
    let model = conversation
        .model_id
        .clone()
        .unwrap_or_else(|| state.chat.selected_model_id().to_string());
    let contact = state.contacts.get(&conversation.contact_id).cloned();

    state.chat.update_message_delivery_status(
        conversation_id,
        &user_message_id,
        DeliveryStatus::Delivered,
    );
    state.chat.set_loading(true);

    tracing::debug!(
        "Sending {} messages in {} with model {}",
        history.len(),
        conversation_id,
        model
    );

    Ok(PendingReply {
        conversation_id: conversation_id.to_string(),
        user_message_id,
        request: CompletionRequest {
            model: Some(model),
            contact,
            history,
        },
    })
}

/// Second half of a send. Whether the conversation is still current is read
/// from `state` here, after the provider call, so navigating away while the
/// reply was pending leaves the reply unread.
pub fn complete_send(
    state: &mut AppState,
    pending: &PendingReply,
    result: Result<String, ProviderError>,
) -> Result<SendOutcome, ChatError> {
    let reply = match result {
        Ok(reply) if reply.trim().is_empty() => {
            return Err(fail_send(state, pending, ChatError::EmptyResponse));
        }
        Ok(reply) => reply,
        Err(e) => return Err(fail_send(state, pending, e.into())),
    };

    let conversation_id = pending.conversation_id.as_str();
    let force_unread = !state.chat.is_current(conversation_id);

    let Some(reply_message_id) =
        state
            .chat
            .add_message(conversation_id, NewMessage::assistant(reply.clone()), force_unread)
    else {
        state.chat.set_loading(false);
        tracing::warn!("Conversation {} was removed before its reply arrived", conversation_id);
        return Err(ChatError::ConversationNotFound(conversation_id.to_string()));
    };

    state.chat.update_message_delivery_status(
        conversation_id,
        &pending.user_message_id,
        DeliveryStatus::Read,
    );
    state.chat.set_loading(false);

    Ok(SendOutcome {
        user_message_id: pending.user_message_id.clone(),
        reply_message_id,
        reply,
    })
}

fn fail_send(state: &mut AppState, pending: &PendingReply, error: ChatError) -> ChatError {
    tracing::error!("Send in {} failed: {}", pending.conversation_id, error);
    state.chat.update_message_delivery_status(
        &pending.conversation_id,
        &pending.user_message_id,
        DeliveryStatus::Failed,
    );
    state.chat.set_loading(false);
    error
}

/// Shared state plus a provider. The state lock is never held across the
/// provider call, so other tasks can keep mutating state (for example
/// switching conversations) while a reply is pending.
#[derive(Clone)]
pub struct ChatSession {
    state: Arc<Mutex<AppState>>,
    provider: Arc<dyn CompletionProvider>,
}

impl ChatSession {
    pub fn new(state: AppState, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            provider,
        }
    }

    /// Run `f` with exclusive access to the state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> AppState {
        self.lock().clone()
    }

    pub async fn send_message_and_get_response(
        &self,
        content: &str,
        conversation_id: &str,
    ) -> Result<SendOutcome, ChatError> {
        let pending = {
            let mut state = self.lock();
            begin_send(&mut state, conversation_id, content)?
        };

        let result = self.provider.complete(pending.request.clone()).await;

        let mut state = self.lock();
        complete_send(&mut state, &pending, result)
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
