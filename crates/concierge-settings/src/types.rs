//! Settings types. Every section falls back to its defaults field by field.

use serde::{Deserialize, Serialize};

/// Root settings object, mirrors `~/.concierge/settings.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConciergeSettings {
    /// Hotel name used in the assistant's system prompt.
    pub hotel_name: String,
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub booking: BookingSettings,
    pub llm: LlmSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

impl Default for ConciergeSettings {
    fn default() -> Self {
        Self {
            hotel_name: "AselvIA".to_string(),
            server: ServerSettings::default(),
            session: SessionSettings::default(),
            booking: BookingSettings::default(),
            llm: LlmSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Network listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Per-client outbound queue depth before frames are dropped.
    pub max_send_queue: usize,
    /// WebSocket ping interval.
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
        }
    }
}

/// Conversation session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Number of turns kept in history; older turns are evicted.
    pub history_window: usize,
    pub idle_timeout_secs: u64,
    pub reap_interval_secs: u64,
    /// Upper bound on a single language-model call.
    pub llm_timeout_secs: u64,
    /// Pending inbound messages per session.
    pub inbox_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_window: 10,
            idle_timeout_secs: 1800,
            reap_interval_secs: 60,
            llm_timeout_secs: 30,
            inbox_capacity: 32,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingSettings {
    /// Longer stays are refused.
    pub max_stay_nights: u32,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self { max_stay_nights: 30 }
    }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-turbo".to_string(),
            temperature: 0.0,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// SQLite ledger database. A leading `~/` expands to `$HOME`.
    pub database_path: String,
    /// Room catalog seed file.
    pub catalog_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: "~/.concierge/concierge.db".to_string(),
            catalog_path: "hotel_data.json".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Persist warn+ records to a SQLite file.
    pub log_to_sqlite: bool,
    pub log_database_path: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_sqlite: true,
            log_database_path: "~/.concierge/logs.db".to_string(),
        }
    }
}
