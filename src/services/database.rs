use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tokio::task;

use crate::config::DEFAULT_MODEL;
use crate::models::{ChatPreview, Contact, Conversation, DeliveryStatus, Message, Role};
use crate::services::chat::AppState;
use crate::services::contacts::ContactStore;
use crate::services::conversation::ChatState;

const KEY_CURRENT_CONVERSATION: &str = "current_conversation_id";
const KEY_SELECTED_CONTACT: &str = "selected_contact_id";
const KEY_SELECTED_MODEL: &str = "selected_model_id";

/// SQLite-backed snapshot store. The in-memory [`AppState`] is the source of
/// truth; this only saves and restores it whole.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;

        tracing::info!("Opened database at {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database (used for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = lock(&self.conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE contacts (
                    id TEXT PRIMARY KEY,
                    position INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    model_id TEXT NOT NULL,
                    avatar TEXT,
                    background_image TEXT,
                    persona TEXT NOT NULL,
                    last_active TEXT NOT NULL,
                    is_online INTEGER NOT NULL DEFAULT 0,
                    unread_count INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE conversations (
                    id TEXT PRIMARY KEY,
                    position INTEGER NOT NULL,
                    contact_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    model_id TEXT,
                    pinned INTEGER NOT NULL DEFAULT 0,
                    muted INTEGER NOT NULL DEFAULT 0,
                    background_image TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE messages (
                    id TEXT NOT NULL,
                    conversation_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    is_read INTEGER NOT NULL DEFAULT 0,
                    read_timestamp TEXT,
                    delivery_status TEXT,
                    PRIMARY KEY (conversation_id, id),
                    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
                );

                CREATE TABLE chat_previews (
                    id TEXT PRIMARY KEY,
                    position INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    last_message TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    unread_count INTEGER NOT NULL DEFAULT 0,
                    model_id TEXT,
                    pinned INTEGER NOT NULL DEFAULT 0,
                    muted INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE app_state (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX idx_messages_conversation ON messages(conversation_id, position);

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        Ok(())
    }

    // --- Snapshot ---

    /// Replace everything stored with `state`, in one transaction. The
    /// loading flag is not persisted.
    pub async fn save_snapshot(&self, state: &AppState) -> Result<()> {
        let conn = self.conn.clone();
        let state = state.clone();
        task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            let tx = conn.transaction()?;
            tx.execute_batch(
                "DELETE FROM messages;
                 DELETE FROM conversations;
                 DELETE FROM chat_previews;
                 DELETE FROM contacts;
                 DELETE FROM app_state;",
            )?;

            write_contacts(&tx, state.contacts.list())?;
            write_conversations(&tx, state.chat.conversations())?;
            write_previews(&tx, state.chat.previews())?;

            let pointers = [
                (KEY_CURRENT_CONVERSATION, state.chat.current_conversation_id()),
                (KEY_SELECTED_CONTACT, state.contacts.selected_contact_id()),
                (KEY_SELECTED_MODEL, Some(state.chat.selected_model_id())),
            ];
            for (key, value) in pointers {
                if let Some(value) = value {
                    tx.execute(
                        "INSERT INTO app_state (key, value) VALUES (?1, ?2)",
                        params![key, value],
                    )?;
                }
            }

            tx.commit()?;
            tracing::debug!(
                "Saved snapshot: {} contacts, {} conversations",
                state.contacts.list().len(),
                state.chat.conversations().len()
            );
            Ok(())
        })
        .await?
    }

    pub async fn load_snapshot(&self) -> Result<AppState> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = lock(&conn)?;

            let contacts = {
                let mut stmt = conn.prepare(
                    "SELECT id, name, model_id, avatar, background_image, persona, last_active, is_online, unread_count
                     FROM contacts ORDER BY position",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_contact(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().collect::<Result<Vec<_>>>()?
            };

            let mut messages = read_messages(&conn)?;
            let conversations = {
                let mut stmt = conn.prepare(
                    "SELECT id, contact_id, title, model_id, pinned, muted, background_image, created_at, updated_at
                     FROM conversations ORDER BY position",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_conversation(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                let mut conversations = rows.into_iter().collect::<Result<Vec<_>>>()?;
                for conversation in &mut conversations {
                    conversation.messages = messages.remove(&conversation.id).unwrap_or_default();
                }
                conversations
            };

            let previews = {
                let mut stmt = conn.prepare(
                    "SELECT id, title, last_message, timestamp, unread_count, model_id, pinned, muted
                     FROM chat_previews ORDER BY position",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_preview(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().collect::<Result<Vec<_>>>()?
            };

            let current_conversation_id = get_value(&conn, KEY_CURRENT_CONVERSATION)?;
            let selected_contact_id = get_value(&conn, KEY_SELECTED_CONTACT)?;
            let selected_model_id = get_value(&conn, KEY_SELECTED_MODEL)?
                .unwrap_or_else(|| DEFAULT_MODEL.to_string());

            tracing::debug!(
                "Loaded snapshot: {} contacts, {} conversations",
                contacts.len(),
                conversations.len()
            );

            Ok(AppState {
                chat: ChatState::from_parts(
                    conversations,
                    previews,
                    current_conversation_id,
                    selected_model_id,
                ),
                contacts: ContactStore::from_parts(contacts, selected_contact_id),
            })
        })
        .await?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| anyhow!("Database connection lock poisoned"))
}

fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM app_state WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

// --- Writers ---

fn write_contacts(tx: &Transaction, contacts: &[Contact]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO contacts (id, position, name, model_id, avatar, background_image, persona, last_active, is_online, unread_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for (position, contact) in contacts.iter().enumerate() {
        let persona = serde_json::to_string(&contact.persona)
            .with_context(|| format!("Failed to serialize persona for {}", contact.id))?;
        stmt.execute(params![
            contact.id,
            position as i64,
            contact.name,
            contact.model_id,
            contact.avatar,
            contact.background_image,
            persona,
            contact.last_active.to_rfc3339(),
            contact.is_online as i32,
            contact.unread_count,
        ])?;
    }
    Ok(())
}

fn write_conversations(tx: &Transaction, conversations: &[Conversation]) -> Result<()> {
    let mut conv_stmt = tx.prepare(
        "INSERT INTO conversations (id, position, contact_id, title, model_id, pinned, muted, background_image, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    let mut msg_stmt = tx.prepare(
        "INSERT INTO messages (id, conversation_id, position, role, content, timestamp, is_read, read_timestamp, delivery_status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    for (position, conv) in conversations.iter().enumerate() {
        conv_stmt.execute(params![
            conv.id,
            position as i64,
            conv.contact_id,
            conv.title,
            conv.model_id,
            conv.pinned as i32,
            conv.muted as i32,
            conv.background_image,
            conv.created_at.to_rfc3339(),
            conv.updated_at.to_rfc3339(),
        ])?;

        for (index, msg) in conv.messages.iter().enumerate() {
            msg_stmt.execute(params![
                msg.id,
                conv.id,
                index as i64,
                msg.role.as_str(),
                msg.content,
                msg.timestamp.to_rfc3339(),
                msg.is_read as i32,
                msg.read_timestamp.map(|t| t.to_rfc3339()),
                msg.delivery_status.map(|s| s.as_str()),
            ])?;
        }
    }
    Ok(())
}

fn write_previews(tx: &Transaction, previews: &[ChatPreview]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO chat_previews (id, position, title, last_message, timestamp, unread_count, model_id, pinned, muted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for (position, preview) in previews.iter().enumerate() {
        stmt.execute(params![
            preview.id,
            position as i64,
            preview.title,
            preview.last_message,
            preview.timestamp.to_rfc3339(),
            preview.unread_count,
            preview.model_id,
            preview.pinned as i32,
            preview.muted as i32,
        ])?;
    }
    Ok(())
}

// --- Row helpers ---

fn read_messages(conn: &Connection) -> Result<HashMap<String, Vec<Message>>> {
    let mut stmt = conn.prepare(
        "SELECT conversation_id, id, role, content, timestamp, is_read, read_timestamp, delivery_status
         FROM messages ORDER BY conversation_id, position",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let conversation_id: String = row.get(0)?;
            Ok((conversation_id, row_to_message(row)))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_conversation: HashMap<String, Vec<Message>> = HashMap::new();
    for (conversation_id, message) in rows {
        by_conversation
            .entry(conversation_id)
            .or_default()
            .push(message?);
    }
    Ok(by_conversation)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn row_to_contact(row: &rusqlite::Row) -> Result<Contact> {
    let persona_json: String = row.get(5)?;
    let last_active: String = row.get(6)?;
    let is_online_int: i32 = row.get(7)?;

    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        model_id: row.get(2)?,
        avatar: row.get(3)?,
        background_image: row.get(4)?,
        persona: serde_json::from_str(&persona_json).context("Failed to parse stored persona")?,
        last_active: parse_time(&last_active)?,
        is_online: is_online_int != 0,
        unread_count: row.get(8)?,
    })
}

fn row_to_conversation(row: &rusqlite::Row) -> Result<Conversation> {
    let pinned_int: i32 = row.get(4)?;
    let muted_int: i32 = row.get(5)?;
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;

    Ok(Conversation {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        title: row.get(2)?,
        messages: Vec::new(),
        created_at: parse_time(&created_str)?,
        updated_at: parse_time(&updated_str)?,
        model_id: row.get(3)?,
        pinned: pinned_int != 0,
        muted: muted_int != 0,
        background_image: row.get(6)?,
    })
}

fn row_to_message(row: &rusqlite::Row) -> Result<Message> {
    let role_str: String = row.get(2)?;
    let timestamp: String = row.get(4)?;
    let is_read_int: i32 = row.get(5)?;
    let read_timestamp: Option<String> = row.get(6)?;
    let status_str: Option<String> = row.get(7)?;

    let delivery_status = match status_str {
        Some(s) => Some(
            DeliveryStatus::from_str(&s)
                .ok_or_else(|| anyhow!("Unknown delivery status: {}", s))?,
        ),
        None => None,
    };

    Ok(Message {
        id: row.get(1)?,
        content: row.get(3)?,
        role: Role::from_str(&role_str).ok_or_else(|| anyhow!("Unknown role: {}", role_str))?,
        timestamp: parse_time(&timestamp)?,
        is_read: is_read_int != 0,
        read_timestamp: read_timestamp.as_deref().map(parse_time).transpose()?,
        delivery_status,
    })
}

fn row_to_preview(row: &rusqlite::Row) -> Result<ChatPreview> {
    let timestamp: String = row.get(3)?;
    let pinned_int: i32 = row.get(6)?;
    let muted_int: i32 = row.get(7)?;

    Ok(ChatPreview {
        id: row.get(0)?,
        title: row.get(1)?,
        last_message: row.get(2)?,
        timestamp: parse_time(&timestamp)?,
        unread_count: row.get(4)?,
        model_id: row.get(5)?,
        pinned: pinned_int != 0,
        muted: muted_int != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewMessage, Persona, PromptMessage, PromptRole, SystemPrompt};
    use crate::services::contacts::NewContact;

    fn populated_state() -> (AppState, String, String) {
        let mut state = AppState::default();
        let contact_id = state
            .contacts
            .create_contact(NewContact {
                name: "Alex".to_string(),
                model_id: None,
                avatar: Some("alex.png".to_string()),
                background_image: None,
                persona: Persona {
                    description: "tutor".to_string(),
                    system_prompt: SystemPrompt::Sequence(vec![
                        PromptMessage::system("A"),
                        PromptMessage {
                            role: PromptRole::User,
                            content: "B".to_string(),
                        },
                    ]),
                    advanced_settings: None,
                },
            })
            .id
            .clone();

        let first = state.chat.create_conversation(None, Some(&contact_id));
        state.chat.add_message(&first, NewMessage::user("hello"), false);
        state.chat.add_message(&first, NewMessage::assistant("hi there"), false);

        let second = state.chat.create_conversation(Some("openai/gpt-4.1"), Some(&contact_id));
        let msg_id = state
            .chat
            .add_message(&second, NewMessage::user("second"), false)
            .unwrap();
        state
            .chat
            .update_message_delivery_status(&second, &msg_id, DeliveryStatus::Failed);
        state.chat.add_message(&first, NewMessage::assistant("unread"), true);
        state.chat.toggle_pin_conversation(&second);
        state.chat.set_selected_model("xai/grok-3-mini-beta:high");

        (state, first, second)
    }

    #[tokio::test]
    async fn test_empty_database_loads_default_state() {
        let db = Database::new_in_memory().unwrap();
        let state = db.load_snapshot().await.unwrap();
        assert!(state.contacts.is_empty());
        assert!(state.chat.conversations().is_empty());
        assert_eq!(state.chat.selected_model_id(), DEFAULT_MODEL);
        assert!(state.chat.current_conversation_id().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let db = Database::new_in_memory().unwrap();
        let (state, first, second) = populated_state();

        db.save_snapshot(&state).await.unwrap();
        let loaded = db.load_snapshot().await.unwrap();

        assert_eq!(loaded.contacts.list(), state.contacts.list());
        assert_eq!(loaded.contacts.selected_contact_id(), state.contacts.selected_contact_id());
        assert_eq!(loaded.chat.conversations(), state.chat.conversations());
        assert_eq!(loaded.chat.previews(), state.chat.previews());
        assert_eq!(loaded.chat.current_conversation_id(), Some(second.as_str()));
        assert_eq!(loaded.chat.selected_model_id(), "xai/grok-3-mini-beta:high");

        // Move-to-front order survives.
        assert_eq!(loaded.chat.previews()[0].id, first);
        assert_eq!(loaded.chat.previews()[0].unread_count, 1);
        let failed = &loaded.chat.conversation(&second).unwrap().messages[0];
        assert_eq!(failed.delivery_status, Some(DeliveryStatus::Failed));
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let db = Database::new_in_memory().unwrap();
        let (mut state, first, _) = populated_state();
        db.save_snapshot(&state).await.unwrap();

        state.chat.delete_conversation(&first);
        db.save_snapshot(&state).await.unwrap();

        let loaded = db.load_snapshot().await.unwrap();
        assert_eq!(loaded.chat.conversations().len(), 1);
        assert!(loaded.chat.conversation(&first).is_none());
        assert!(loaded.chat.preview(&first).is_none());
    }

    #[tokio::test]
    async fn test_loading_flag_not_persisted() {
        let db = Database::new_in_memory().unwrap();
        let (mut state, _, _) = populated_state();
        state.chat.set_loading(true);
        db.save_snapshot(&state).await.unwrap();
        assert!(!db.load_snapshot().await.unwrap().chat.is_loading());
    }

    #[test]
    fn test_schema_version_is_current() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();

        let conn = lock(&db.conn).unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_on_disk_database_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chatmates.db");
        let (state, _, _) = populated_state();

        {
            let db = Database::new(&path).unwrap();
            db.save_snapshot(&state).await.unwrap();
        }

        let db = Database::new(&path).unwrap();
        let loaded = db.load_snapshot().await.unwrap();
        assert_eq!(loaded.chat.conversations(), state.chat.conversations());
        assert_eq!(loaded.contacts.list().len(), 1);
    }
}
