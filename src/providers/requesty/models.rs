use serde::{Deserialize, Serialize};

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct RequestyRequest {
    pub model: String,
    pub messages: Vec<RequestyMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestyMessage {
    pub role: String,
    pub content: String,
}

// --- Error types ---

#[derive(Debug, Deserialize)]
pub struct RequestyErrorResponse {
    pub error: RequestyErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct RequestyErrorDetail {
    pub message: String,
}
