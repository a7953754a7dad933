//! Warn-and-above events persisted to a SQLite file, keyed by the
//! session, client and reservation they concern.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Ids lifted out of event and span fields into their own columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationIds {
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    pub reservation_id: Option<String>,
}

impl CorrelationIds {
    fn slot(&mut self, field: &str) -> Option<&mut Option<String>> {
        match field {
            "session_id" => Some(&mut self.session_id),
            "client_id" => Some(&mut self.client_id),
            "reservation_id" => Some(&mut self.reservation_id),
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.client_id.is_none() && self.reservation_id.is_none()
    }

    fn is_complete(&self) -> bool {
        self.session_id.is_some() && self.client_id.is_some() && self.reservation_id.is_some()
    }

    /// Fill unset ids from an enclosing span.
    fn inherit(&mut self, outer: &CorrelationIds) {
        if self.session_id.is_none() {
            self.session_id.clone_from(&outer.session_id);
        }
        if self.client_id.is_none() {
            self.client_id.clone_from(&outer.client_id);
        }
        if self.reservation_id.is_none() {
            self.reservation_id.clone_from(&outer.reservation_id);
        }
    }
}

/// A persisted log record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
    pub fields: Option<String>,
    #[serde(flatten)]
    pub ids: CorrelationIds,
}

#[derive(Clone, Debug, Default)]
pub struct LogQuery {
    pub level: Option<String>,
    /// Substring match on the event target.
    pub target: Option<String>,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    pub reservation_id: Option<String>,
    /// RFC 3339 lower bound, inclusive.
    pub since: Option<String>,
    pub limit: Option<u32>,
}

impl LogQuery {
    fn to_sql(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<(&str, Box<dyn ToSql>)> = Vec::new();
        if let Some(level) = &self.level {
            clauses.push(("level = ?", Box::new(level.to_uppercase())));
        }
        if let Some(target) = &self.target {
            clauses.push(("target LIKE ?", Box::new(format!("%{target}%"))));
        }
        for (column, value) in [
            ("session_id = ?", &self.session_id),
            ("client_id = ?", &self.client_id),
            ("reservation_id = ?", &self.reservation_id),
            ("timestamp >= ?", &self.since),
        ] {
            if let Some(value) = value {
                clauses.push((column, Box::new(value.clone())));
            }
        }

        let mut sql = String::from(
            "SELECT id, timestamp, level, target, message, fields, session_id, client_id, reservation_id
             FROM logs",
        );
        let mut params = Vec::with_capacity(clauses.len());
        for (i, (clause, value)) in clauses.into_iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(clause);
            params.push(value);
        }
        sql.push_str(&format!(" ORDER BY id DESC LIMIT {}", self.limit.unwrap_or(100)));
        (sql, params)
    }
}

pub struct SqliteLogSink {
    conn: Mutex<Connection>,
}

impl SqliteLogSink {
    pub fn new(db_path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS logs (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 timestamp TEXT NOT NULL,
                 level TEXT NOT NULL,
                 target TEXT NOT NULL,
                 message TEXT NOT NULL,
                 fields TEXT,
                 session_id TEXT,
                 client_id TEXT,
                 reservation_id TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_logs_session ON logs(session_id);
             CREATE INDEX IF NOT EXISTS idx_logs_reservation ON logs(reservation_id);
             CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Failures are swallowed: logging must never take the server down.
    fn insert(&self, entry: &LogEntry) {
        let _ = self.conn.lock().execute(
            "INSERT INTO logs (timestamp, level, target, message, fields, session_id, client_id, reservation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                entry.timestamp,
                entry.level,
                entry.target,
                entry.message,
                entry.fields,
                entry.ids.session_id,
                entry.ids.client_id,
                entry.ids.reservation_id,
            ],
        );
    }

    /// Newest first.
    pub fn query(&self, q: &LogQuery) -> Result<Vec<LogRecord>, rusqlite::Error> {
        let (sql, params) = q.to_sql();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(LogRecord {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                level: row.get(2)?,
                target: row.get(3)?,
                message: row.get(4)?,
                fields: row.get(5)?,
                ids: CorrelationIds {
                    session_id: row.get(6)?,
                    client_id: row.get(7)?,
                    reservation_id: row.get(8)?,
                },
            })
        })?;
        rows.collect()
    }

    pub fn count(&self) -> Result<i64, rusqlite::Error> {
        self.conn
            .lock()
            .query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))
    }
}

struct LogEntry {
    timestamp: String,
    level: String,
    target: String,
    message: String,
    fields: Option<String>,
    ids: CorrelationIds,
}

/// Layer writing warn+ events to a [`SqliteLogSink`].
pub struct SqliteLogLayer {
    sink: Arc<SqliteLogSink>,
}

impl SqliteLogLayer {
    pub fn new(sink: Arc<SqliteLogSink>) -> Self {
        Self { sink }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
    ids: CorrelationIds,
}

impl FieldVisitor {
    fn text(&mut self, name: &str, val: String) {
        if name == "message" {
            self.message = Some(val);
        } else if let Some(slot) = self.ids.slot(name) {
            *slot = Some(val);
        } else {
            self.fields.insert(name.to_string(), Value::String(val));
        }
    }

    fn value(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let val = format!("{value:?}");
        if field.name() == "message" {
            self.text("message", val);
        } else {
            self.text(field.name(), val.trim_matches('"').to_string());
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.text(field.name(), value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.value(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.value(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.value(field, Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.value(field, value.into());
    }
}

impl<S> Layer<S> for SqliteLogLayer
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > tracing::Level::WARN {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if visitor.ids.is_complete() {
                    break;
                }
                if let Some(outer) = span.extensions().get::<CorrelationIds>() {
                    visitor.ids.inherit(outer);
                }
            }
        }

        let fields = if visitor.fields.is_empty() {
            None
        } else {
            serde_json::to_string(&visitor.fields).ok()
        };

        self.sink.insert(&LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level: level.to_string().to_uppercase(),
            target: event.metadata().target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields,
            ids: visitor.ids,
        });
    }

    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        if visitor.ids.is_empty() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.ids);
        }
    }
}
