use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use chatmates::config::{self, ProviderConfig};
use chatmates::models::{Conversation, Role};
use chatmates::providers::catalog::{self, FEATURED_MODELS};
use chatmates::providers::RequestyProvider;
use chatmates::services::{sample_contacts, AppState, ChatSession, Database};

const HELP: &str = "\
/contacts        list contacts
/chat <n>        open (or start) the chat with contact n
/list            list conversations
/open <n>        open conversation n from /list
/pin <n>         pin or unpin conversation n
/mute <n>        mute or unmute conversation n
/rename <title>  rename the open conversation
/delete          delete the open conversation
/models          list featured models
/model <n|id>    default model for new conversations
/quit            exit
anything else is sent to the open conversation";

#[derive(Debug, PartialEq)]
enum Command {
    Contacts,
    Chat(usize),
    List,
    Open(usize),
    Pin(usize),
    Mute(usize),
    Rename(String),
    Delete,
    Models,
    Model(String),
    Help,
    Quit,
    Send(String),
    Invalid(String),
}

impl Command {
    fn parse(line: &str) -> Command {
        let line = line.trim();
        if !line.starts_with('/') {
            return Command::Send(line.to_string());
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };
        let index = || arg.parse::<usize>().ok().filter(|n| *n > 0);

        match name {
            "/contacts" => Command::Contacts,
            "/list" => Command::List,
            "/models" => Command::Models,
            "/delete" => Command::Delete,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            "/chat" => index().map_or_else(|| Command::Invalid("usage: /chat <n>".into()), Command::Chat),
            "/open" => index().map_or_else(|| Command::Invalid("usage: /open <n>".into()), Command::Open),
            "/pin" => index().map_or_else(|| Command::Invalid("usage: /pin <n>".into()), Command::Pin),
            "/mute" => index().map_or_else(|| Command::Invalid("usage: /mute <n>".into()), Command::Mute),
            "/rename" if !arg.is_empty() => Command::Rename(arg.to_string()),
            "/rename" => Command::Invalid("usage: /rename <title>".into()),
            "/model" if !arg.is_empty() => Command::Model(arg.to_string()),
            "/model" => Command::Invalid("usage: /model <n|id>".into()),
            other => Command::Invalid(format!("unknown command {} (try /help)", other)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = ProviderConfig::from_env();
    if !config.has_api_key() {
        tracing::warn!("No API key configured; replies will be a placeholder message");
    }
    tracing::debug!("Provider config: {:?}", config);

    let db_path = config::database_path();
    let db = Database::new(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let mut state = db.load_snapshot().await.context("Failed to load saved chats")?;

    if state.contacts.is_empty() {
        tracing::info!("First launch, adding sample contacts");
        for contact in sample_contacts() {
            state.contacts.create_contact(contact);
        }
        state.chat.set_selected_model(&config.default_model);
        db.save_snapshot(&state).await?;
    }

    let provider = Arc::new(RequestyProvider::new(config));
    let session = ChatSession::new(state, provider);

    println!("{}\n", HELP);
    session.with_state(|s| print_contacts(s));

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Command::Quit => break,
            command => run_command(&session, command).await,
        }

        if let Err(e) = db.save_snapshot(&session.snapshot()).await {
            tracing::error!("Failed to save chats: {:#}", e);
        }
    }

    Ok(())
}

async fn run_command(session: &ChatSession, command: Command) {
    match command {
        Command::Send(text) => {
            let current = session.with_state(|s| s.chat.current_conversation_id().map(str::to_string));
            let Some(conversation_id) = current else {
                println!("Open a chat first with /chat <n>");
                return;
            };
            match session.send_message_and_get_response(&text, &conversation_id).await {
                Ok(outcome) => println!("{}\n", outcome.reply),
                Err(e) => {
                    tracing::error!("Send failed: {}", e);
                    println!("(failed) {}", e);
                }
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Invalid(message) => println!("{}", message),
        Command::Quit => {}
        command => session.with_state(|s| apply_local(s, command)),
    }
}

/// Commands that only touch local state.
fn apply_local(state: &mut AppState, command: Command) {
    match command {
        Command::Contacts => print_contacts(state),
        Command::List => print_previews(state),
        Command::Chat(n) => {
            let Some(contact) = state.contacts.list().get(n - 1).cloned() else {
                println!("No contact #{}", n);
                return;
            };
            state.contacts.select_contact(&contact.id);

            let existing = state
                .chat
                .conversation_for_contact(&contact.id)
                .map(|c| c.id.clone());
            let conversation_id = match existing {
                Some(id) => {
                    state.chat.select_conversation(&id);
                    state.chat.mark_all_messages_as_read(&id);
                    id
                }
                None => state
                    .chat
                    .create_conversation(Some(&contact.model_id), Some(&contact.id)),
            };
            println!("Chatting with {}", contact.name);
            if let Some(conversation) = state.chat.conversation(&conversation_id) {
                print_history(conversation, &contact.name);
            }
        }
        Command::Open(n) => {
            let Some(id) = preview_id(state, n) else {
                return;
            };
            state.chat.select_conversation(&id);
            state.chat.mark_all_messages_as_read(&id);
            if let Some(conversation) = state.chat.conversation(&id) {
                let name = state
                    .contacts
                    .get(&conversation.contact_id)
                    .map_or("assistant", |c| c.name.as_str());
                print_history(conversation, name);
            }
        }
        Command::Pin(n) => {
            if let Some(id) = preview_id(state, n) {
                state.chat.toggle_pin_conversation(&id);
                print_previews(state);
            }
        }
        Command::Mute(n) => {
            if let Some(id) = preview_id(state, n) {
                state.chat.toggle_mute_conversation(&id);
                print_previews(state);
            }
        }
        Command::Rename(title) => match state.chat.current_conversation_id().map(str::to_string) {
            Some(id) => state.chat.update_conversation_title(&id, &title),
            None => println!("No conversation is open"),
        },
        Command::Delete => match state.chat.current_conversation_id().map(str::to_string) {
            Some(id) => {
                state.chat.delete_conversation(&id);
                println!("Deleted");
            }
            None => println!("No conversation is open"),
        },
        Command::Models => print_models(state),
        Command::Model(choice) => {
            let Some(model_id) = catalog::resolve_model(&choice) else {
                println!("No model #{} (see /models)", choice);
                return;
            };
            if !catalog::is_known_model(model_id) {
                tracing::warn!("Model {} is not in the catalog", model_id);
                println!("{} is not a known model; using it anyway", model_id);
            }
            state.chat.set_selected_model(model_id);
            println!("New conversations will use {}", model_id);
        }
        Command::Send(_) | Command::Help | Command::Quit | Command::Invalid(_) => {}
    }
}

fn preview_id(state: &AppState, n: usize) -> Option<String> {
    let id = state.chat.previews().get(n - 1).map(|p| p.id.clone());
    if id.is_none() {
        println!("No conversation #{} (see /list)", n);
    }
    id
}

fn print_contacts(state: &AppState) {
    for (i, contact) in state.contacts.list().iter().enumerate() {
        let unread = if contact.unread_count > 0 {
            format!(" ({})", contact.unread_count)
        } else {
            String::new()
        };
        println!(
            "{}. {}{} [{}] {}",
            i + 1,
            contact.name,
            unread,
            contact.model_id,
            contact.persona.description
        );
    }
}

fn print_models(state: &AppState) {
    for (i, model) in FEATURED_MODELS.iter().enumerate() {
        let marker = if model.id == state.chat.selected_model_id() { "*" } else { " " };
        println!(
            "{}{}. {} ({}) {}",
            marker,
            i + 1,
            model.name,
            model.provider,
            model.description
        );
    }
}

fn print_previews(state: &AppState) {
    if state.chat.previews().is_empty() {
        println!("No conversations yet");
        return;
    }
    for (i, preview) in state.chat.previews().iter().enumerate() {
        let marker = if state.chat.is_current(&preview.id) { "*" } else { " " };
        let mut flags = String::new();
        if preview.pinned {
            flags.push_str(" [pinned]");
        }
        if preview.muted {
            flags.push_str(" [muted]");
        }
        if preview.unread_count > 0 {
            flags.push_str(&format!(" ({} new)", preview.unread_count));
        }
        println!(
            "{}{}. {}{} | {} | {}",
            marker,
            i + 1,
            preview.title,
            flags,
            preview.last_message,
            preview.timestamp.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_history(conversation: &Conversation, name: &str) {
    for message in &conversation.messages {
        let speaker = match message.role {
            Role::User => "me",
            Role::Assistant => name,
        };
        let status = message
            .delivery_status
            .map(|s| format!(" ({})", s.as_str()))
            .unwrap_or_default();
        println!("[{}]{} {}", speaker, status, message.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/chat 2"), Command::Chat(2));
        assert_eq!(Command::parse("  /list "), Command::List);
        assert_eq!(Command::parse("/rename Weekend plans"), Command::Rename("Weekend plans".into()));
        assert_eq!(Command::parse("/model openai/gpt-4.1"), Command::Model("openai/gpt-4.1".into()));
        assert_eq!(Command::parse("hello there"), Command::Send("hello there".into()));
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("/models"), Command::Models);
        assert_eq!(Command::parse("/model 3"), Command::Model("3".into()));
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(matches!(Command::parse("/chat"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/open 0"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/pin x"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/rename"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/nope"), Command::Invalid(_)));
    }

    #[test]
    fn test_model_command_picks_from_catalog() {
        let mut state = AppState::default();

        apply_local(&mut state, Command::Model("3".into()));
        assert_eq!(state.chat.selected_model_id(), "openai/gpt-4.1");

        apply_local(&mut state, Command::Model("42".into()));
        assert_eq!(state.chat.selected_model_id(), "openai/gpt-4.1");

        apply_local(&mut state, Command::Model("acme/custom-model".into()));
        assert_eq!(state.chat.selected_model_id(), "acme/custom-model");
    }

    #[test]
    fn test_chat_command_reuses_conversation() {
        let mut state = AppState::default();
        for contact in sample_contacts() {
            state.contacts.create_contact(contact);
        }

        apply_local(&mut state, Command::Chat(1));
        let first = state.chat.current_conversation_id().map(str::to_string);
        assert!(first.is_some());

        apply_local(&mut state, Command::Chat(2));
        apply_local(&mut state, Command::Chat(1));
        assert_eq!(state.chat.current_conversation_id().map(str::to_string), first);
        assert_eq!(state.chat.conversations().len(), 2);
    }
}
