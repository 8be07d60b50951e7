pub const DEFAULT_MAX_TOKENS: u32 = 8192;

const MODEL_MAX_TOKENS: &[(&str, u32)] = &[
    ("anthropic/claude-3-opus-20240229", 4096),
    ("anthropic/claude-3-sonnet-20240229", 4096),
    ("anthropic/claude-3-haiku-20240307", 4096),
    ("anthropic/claude-3-7-sonnet-latest", 4096),
];

/// `max_tokens` for a model id; unlisted models get the default.
pub fn max_tokens_for_model(model: &str) -> u32 {
    MODEL_MAX_TOKENS
        .iter()
        .find(|(id, _)| *id == model)
        .map(|(_, limit)| *limit)
        .unwrap_or(DEFAULT_MAX_TOKENS)
}
