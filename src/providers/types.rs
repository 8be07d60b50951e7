use thiserror::Error;

use crate::models::{Contact, PromptMessage};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: API key is invalid or expired (status {status})")]
    AuthError { status: u16 },

    #[error("Request failed: {status} {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Everything the adapter needs for one completion call: the contact whose
/// persona applies (if any), the model, and the full accumulated history.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: Option<String>,
    pub contact: Option<Contact>,
    pub history: Vec<PromptMessage>,
}
