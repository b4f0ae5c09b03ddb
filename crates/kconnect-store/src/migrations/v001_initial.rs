//! v001 -- Initial schema creation.
//!
//! Creates the three tables the client persists: `session`, `notifications`
//! and `app_settings`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Session slot (at most one signed-in user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS session (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    user_json  TEXT NOT NULL,                 -- serialized User record
    saved_at   TEXT NOT NULL                  -- RFC-3339
);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    created_at  INTEGER NOT NULL,             -- unix micros, sort key of record
    seq         INTEGER NOT NULL,             -- tie-breaker within one timestamp
    is_read     INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    json        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_created
    ON notifications(created_at, seq);

-- ----------------------------------------------------------------
-- User-facing settings (single JSON document)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS app_settings (
    id   INTEGER PRIMARY KEY CHECK (id = 1),
    json TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
