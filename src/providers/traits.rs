use async_trait::async_trait;

use super::types::{CompletionRequest, ProviderError};

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Produce the assistant reply text.
    ///
    /// Soft failures (missing key, unusable response shape) come back as
    /// `Ok` sentinel text; only transport and HTTP failures are errors.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}
