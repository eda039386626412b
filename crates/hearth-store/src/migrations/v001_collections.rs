//! v001 -- Entity snapshot table.
//!
//! Each top-level store collection is one row holding a JSON array.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name       TEXT PRIMARY KEY NOT NULL,   -- collection name, e.g. "users"
    json       TEXT NOT NULL,               -- serialized collection
    updated_at TEXT NOT NULL                -- RFC-3339
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
