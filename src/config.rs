use std::path::PathBuf;

pub const APP_NAME: &str = "chatmates";

pub const DEFAULT_BASE_URL: &str = "https://router.requesty.ai/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3-7-sonnet-latest";

const ENV_API_KEY: &str = "REQUESTY_LLM_API_KEY";
const ENV_BASE_URL: &str = "REQUESTY_BASE_URL";
const ENV_MODEL: &str = "REQUESTY_MODEL";
const ENV_DEBUG_MODE: &str = "DEBUG_MODE";
const ENV_DB_PATH: &str = "CHATMATES_DB";

/// Connection settings for the completion provider.
///
/// The state machine never reads these; they are handed to the adapter.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub debug_mode: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            debug_mode: false,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("debug_mode", &self.debug_mode)
            .finish()
    }
}

impl ProviderConfig {
    /// Load from `REQUESTY_LLM_API_KEY`, `REQUESTY_BASE_URL`, `REQUESTY_MODEL`
    /// and `DEBUG_MODE`. Empty values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = lookup(ENV_API_KEY).unwrap_or_default();
        if !api_key.is_empty() && !is_valid_api_key_format(&api_key) {
            tracing::warn!("{} does not look like a Requesty key (expected sk-...)", ENV_API_KEY);
        }

        Self {
            api_key,
            base_url: non_empty(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_model: non_empty(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            debug_mode: lookup(ENV_DEBUG_MODE).as_deref() == Some("true"),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn is_valid_api_key_format(api_key: &str) -> bool {
    api_key.len() >= 20 && api_key.starts_with("sk-")
}

/// Location of the SQLite snapshot: `CHATMATES_DB`, else
/// `$XDG_DATA_HOME/chatmates/chatmates.db`, else `~/.local/share/...`.
pub fn database_path() -> PathBuf {
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".local/share"))
                .unwrap_or_else(|_| PathBuf::from("."))
        });
    data_dir.join(APP_NAME).join("chatmates.db")
}
