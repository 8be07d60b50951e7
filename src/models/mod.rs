pub mod contact;
pub mod conversation;
pub mod message;

pub use contact::{AdvancedSettings, Contact, Persona, PromptMessage, PromptRole, SystemPrompt};
pub use conversation::{ChatPreview, Conversation, PLACEHOLDER_TITLE};
pub use message::{DeliveryStatus, Message, NewMessage, Role};
