pub mod catalog;
pub mod limits;
pub mod persona;
pub mod prompts;
pub mod requesty;
pub mod traits;
pub mod types;

pub use requesty::RequestyProvider;
pub use traits::CompletionProvider;
pub use types::{CompletionRequest, ProviderError};
