//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::ConciergeSettings;

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

/// Resolve the path to the settings file (`~/.concierge/settings.json`).
pub fn settings_path() -> PathBuf {
    home_dir().join(".concierge").join("settings.json")
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ConciergeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ConciergeSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    validate(&settings)?;
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<ConciergeSettings> {
    let defaults = serde_json::to_value(ConciergeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn validate(settings: &ConciergeSettings) -> Result<()> {
    if settings.session.history_window == 0 {
        return Err(SettingsError::InvalidValue(
            "session.historyWindow must be at least 1".into(),
        ));
    }
    if settings.session.inbox_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "session.inboxCapacity must be at least 1".into(),
        ));
    }
    if settings.booking.max_stay_nights == 0 {
        return Err(SettingsError::InvalidValue(
            "booking.maxStayNights must be at least 1".into(),
        ));
    }
    if settings.server.max_send_queue == 0 {
        return Err(SettingsError::InvalidValue(
            "server.maxSendQueue must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Apply `CONCIERGE_*` overrides. `lookup` resolves a variable name to its value.
///
/// Invalid values are logged and ignored (falling back to file/default).
pub fn apply_env_overrides<F>(settings: &mut ConciergeSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("CONCIERGE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("CONCIERGE_PORT", 1, 65535) {
        settings.server.port = v;
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = env.string("CONCIERGE_DB_PATH") {
        settings.storage.database_path = v;
    }
    if let Some(v) = env.string("CONCIERGE_CATALOG_PATH") {
        settings.storage.catalog_path = v;
    }

    // ── LLM ─────────────────────────────────────────────────────────
    if let Some(v) = env.string("CONCIERGE_LLM_MODEL") {
        settings.llm.model = v;
    }
    if let Some(v) = env.string("CONCIERGE_LLM_BASE_URL") {
        settings.llm.base_url = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = env.u64("CONCIERGE_LLM_TIMEOUT_SECS", 1, 600) {
        settings.session.llm_timeout_secs = v;
    }
    if let Some(v) = env.u64("CONCIERGE_IDLE_TIMEOUT_SECS", 1, 86_400) {
        settings.session.idle_timeout_secs = v;
    }
    if let Some(v) = env.usize("CONCIERGE_HISTORY_WINDOW", 1, 1_000) {
        settings.session.history_window = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.bool("CONCIERGE_LOG_TO_SQLITE") {
        settings.logging.log_to_sqlite = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, kind: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, "bool", parse_bool)
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.parsed(name, "u16", |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, "u64", |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, "usize", |v| parse_usize_range(v, min, max))
    }
}
