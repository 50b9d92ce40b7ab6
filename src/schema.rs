use rusqlite::Connection;

use crate::errors::EntitySyncError;

/// Schema for the authoritative relational store. The search index and graph
/// store keep their own schemas on their own connections.
pub fn ensure_schema(conn: &Connection) -> Result<(), EntitySyncError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS entities (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            kind       TEXT NOT NULL,
            owner      TEXT NOT NULL,
            name       TEXT NOT NULL,
            fields     TEXT NOT NULL,
            tags       TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS relations (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            owner         TEXT NOT NULL,
            from_id       INTEGER NOT NULL,
            to_id         INTEGER NOT NULL,
            relation_type TEXT NOT NULL,
            UNIQUE(from_id, to_id, relation_type)
        );
        CREATE TABLE IF NOT EXISTS tag_ledger (
            owner TEXT NOT NULL,
            path  TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            UNIQUE(owner, path)
        );
        CREATE INDEX IF NOT EXISTS idx_entities_owner_kind ON entities(owner, kind);
        CREATE INDEX IF NOT EXISTS idx_entities_identity ON entities(owner, kind, name);
        CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_id);
        CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_id);
        CREATE INDEX IF NOT EXISTS idx_ledger_owner ON tag_ledger(owner);
        "#,
    )
    .map_err(|e| EntitySyncError::schema(e.to_string()))?;
    Ok(())
}
