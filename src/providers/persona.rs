//! Turns a contact's persona plus conversation history into the ordered
//! message list sent to the provider.

use crate::models::{Contact, PromptMessage, PromptRole, SystemPrompt};

use super::prompts::{default_prompt_for, name_prefix, SAFETY_GUIDELINES};

/// How many of the most recent history messages are sent with each request.
/// Older messages are dropped, not summarized.
pub const HISTORY_WINDOW: usize = 10;

/// System messages derived from the contact's persona, without the safety
/// guideline. Only the first `system` entry gets the name prefix.
pub fn persona_messages(contact: Option<&Contact>) -> Vec<PromptMessage> {
    let configured = contact.filter(|c| !c.persona.system_prompt.is_blank());

    let Some(contact) = configured else {
        let description = contact.map(|c| c.persona.description.as_str());
        return vec![PromptMessage::system(default_prompt_for(description))];
    };

    let prefix = name_prefix(&contact.name);
    match &contact.persona.system_prompt {
        SystemPrompt::Text(content) => vec![PromptMessage::system(format!("{}{}", prefix, content))],
        SystemPrompt::Single(msg) => vec![PromptMessage {
            role: msg.role,
            content: format!("{}{}", prefix, msg.content),
        }],
        SystemPrompt::Sequence(msgs) => {
            let mut prefixed = false;
            msgs.iter()
                .map(|msg| {
                    if msg.role == PromptRole::System && !prefixed {
                        prefixed = true;
                        PromptMessage {
                            role: msg.role,
                            content: format!("{}{}", prefix, msg.content),
                        }
                    } else {
                        msg.clone()
                    }
                })
                .collect()
        }
    }
}

/// Full provider message list: persona messages, the safety guideline, then
/// the last `history_window` history entries in their original order.
pub fn build_prompt_messages(
    contact: Option<&Contact>,
    history: &[PromptMessage],
    history_window: usize,
) -> Vec<PromptMessage> {
    let mut messages = persona_messages(contact);
    messages.push(PromptMessage::system(SAFETY_GUIDELINES));

    let start = history.len().saturating_sub(history_window);
    messages.extend(history[start..].iter().cloned());
    messages
}
