//! Models reachable through the Requesty router.

use crate::config::DEFAULT_MODEL;

/// Every model id the router is known to serve. Other ids are still passed
/// through; this list only drives lookups and warnings.
pub const REQUESTY_MODELS: &[&str] = &[
    // Anthropic
    "anthropic/claude-3-opus-20240229",
    "anthropic/claude-3-sonnet-20240229",
    "anthropic/claude-3-haiku-20240307",
    "anthropic/claude-3-7-sonnet-latest",
    // OpenAI
    "openai/gpt-4",
    "openai/gpt-4-turbo-preview",
    "openai/gpt-4-vision-preview",
    "openai/gpt-3.5-turbo",
    "openai/chatgpt-4o-latest",
    "openai/gpt-4.1",
    "openai/o4-mini:high",
    "openai/o3-2025-04-16",
    // Google
    "google/gemini-pro",
    "google/gemini-pro-vision",
    "google/gemini-2.5-flash-preview-04-17",
    // Meta
    "meta/llama-3-70b-instruct",
    "meta/llama-3-8b-instruct",
    // Mistral
    "mistral/mistral-large-latest",
    "mistral/mistral-medium-latest",
    "mistral/mistral-small-latest",
    // xAI
    "xai/grok-1",
    "xai/grok-2",
    "xai/grok-3-mini-beta",
    "xai/grok-3-mini-beta:high",
    // Perplexity
    "perplexity/sonar",
    // DeepSeek
    "deepseek/deepseek-chat",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
    pub description: &'static str,
}

/// Models offered when picking a model, default first.
pub const FEATURED_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: DEFAULT_MODEL,
        name: "Claude 3.7 Sonnet",
        provider: "Anthropic",
        description: "최신 Claude 모델, 균형 잡힌 성능과 속도",
    },
    ModelInfo {
        id: "openai/chatgpt-4o-latest",
        name: "GPT-4o",
        provider: "OpenAI",
        description: "OpenAI의 최신 멀티모달 모델",
    },
    ModelInfo {
        id: "openai/gpt-4.1",
        name: "GPT-4.1",
        provider: "OpenAI",
        description: "GPT-4의 개선된 버전",
    },
    ModelInfo {
        id: "openai/o4-mini:high",
        name: "O4 Mini (High)",
        provider: "OpenAI",
        description: "경량화된 GPT-4o 모델, 높은 품질",
    },
    ModelInfo {
        id: "openai/o3-2025-04-16",
        name: "O3 (2025-04-16)",
        provider: "OpenAI",
        description: "OpenAI의 O3 모델",
    },
    ModelInfo {
        id: "xai/grok-3-mini-beta:high",
        name: "Grok 3 Mini (High)",
        provider: "xAI",
        description: "xAI의 Grok 3 Mini 모델, 높은 품질",
    },
    ModelInfo {
        id: "perplexity/sonar",
        name: "Sonar",
        provider: "Perplexity",
        description: "Perplexity의 Sonar 모델",
    },
    ModelInfo {
        id: "deepseek/deepseek-chat",
        name: "DeepSeek Chat",
        provider: "DeepSeek",
        description: "DeepSeek의 대화 모델",
    },
    ModelInfo {
        id: "google/gemini-2.5-flash-preview-04-17",
        name: "Gemini 2.5 Flash",
        provider: "Google",
        description: "Google의 Gemini 2.5 Flash 모델",
    },
];

pub fn is_known_model(id: &str) -> bool {
    REQUESTY_MODELS.iter().any(|m| *m == id)
}

pub fn featured_model(id: &str) -> Option<&'static ModelInfo> {
    FEATURED_MODELS.iter().find(|m| m.id == id)
}

/// Resolve a user's model choice: a 1-based index into [`FEATURED_MODELS`]
/// or a model id, which is returned as given.
pub fn resolve_model(choice: &str) -> Option<&str> {
    let choice = choice.trim();
    if choice.is_empty() {
        return None;
    }
    match choice.parse::<usize>() {
        Ok(n) => n
            .checked_sub(1)
            .and_then(|i| FEATURED_MODELS.get(i))
            .map(|m| m.id),
        Err(_) => Some(choice),
    }
}
