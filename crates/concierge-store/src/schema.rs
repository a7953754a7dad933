/// SQL DDL for the booking ledger database.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS room_types (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    rate_minor INTEGER NOT NULL,
    currency TEXT NOT NULL DEFAULT 'EUR',
    inventory INTEGER NOT NULL CHECK (inventory >= 0),
    position INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS reservations (
    id TEXT PRIMARY KEY,
    room_type_id TEXT NOT NULL REFERENCES room_types(id),
    check_in TEXT NOT NULL,
    check_out TEXT NOT NULL,
    guest_name TEXT NOT NULL,
    guest_email TEXT,
    guest_phone TEXT,
    party_size INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'confirmed',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reservations_room_type ON reservations(room_type_id);
CREATE INDEX IF NOT EXISTS idx_reservations_created ON reservations(created_at, id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = FULL;
"#;
