pub mod chat;
pub mod contacts;
pub mod conversation;
pub mod database;
pub mod ids;

pub use chat::{begin_send, complete_send, AppState, ChatError, ChatSession, PendingReply, SendOutcome};
pub use contacts::{sample_contacts, ContactStore, ContactUpdate, NewContact};
pub use conversation::ChatState;
pub use database::Database;
