//! Search index projection. Documents live in a content table mirrored into
//! an FTS5 virtual table by triggers, so the projection write path is a plain
//! upsert and re-applying the same document is a no-op in effect.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{entity::Entity, errors::EntitySyncError, tags};

/// The owner-scoped searchable projection of one entity. `tags` carries the
/// expanded set (every tag plus all ancestor prefixes), so a query for an
/// ancestor path finds entities tagged only with descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub entity_id: i64,
    pub owner: String,
    pub kind: String,
    pub name: String,
    pub body: String,
    pub tags: Vec<String>,
}

impl SearchDocument {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            entity_id: entity.id,
            owner: entity.owner.clone(),
            kind: entity.kind.as_str().to_string(),
            name: entity.name.clone(),
            body: flatten_fields(&entity.fields),
            tags: tags::expand(&entity.tags),
        }
    }
}

/// Write-path contract of the search index. Both operations are idempotent.
pub trait SearchIndex {
    fn upsert_document(&self, doc: &SearchDocument) -> Result<(), EntitySyncError>;
    fn delete_document(&self, entity_id: i64) -> Result<(), EntitySyncError>;
}

pub struct SqliteSearchIndex {
    conn: Connection,
}

impl SqliteSearchIndex {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EntitySyncError> {
        let conn =
            Connection::open(path).map_err(|e| EntitySyncError::connection(e.to_string()))?;
        ensure_search_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, EntitySyncError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EntitySyncError::connection(e.to_string()))?;
        ensure_search_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Owner-scoped full-text query over name, body, and tags, ranked by
    /// FTS5 relevance. Returns entity ids.
    pub fn search(&self, owner: &str, query: &str) -> Result<Vec<i64>, EntitySyncError> {
        if query.trim().is_empty() {
            return Err(EntitySyncError::invalid_input("search query required"));
        }
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT d.entity_id FROM search_documents d \
                 JOIN search_fts ON d.entity_id = search_fts.rowid \
                 WHERE search_fts MATCH ?1 AND d.owner = ?2 \
                 ORDER BY search_fts.rank",
            )
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![query, owner], |row| row.get(0))
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id.map_err(|e| EntitySyncError::query(e.to_string()))?);
        }
        Ok(ids)
    }

    pub fn contains(&self, entity_id: i64) -> Result<bool, EntitySyncError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM search_documents WHERE entity_id=?1",
                params![entity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        Ok(found.is_some())
    }

    pub fn document_count(&self, owner: &str) -> Result<i64, EntitySyncError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM search_documents WHERE owner=?1",
                params![owner],
                |row| row.get(0),
            )
            .map_err(|e| EntitySyncError::query(e.to_string()))
    }
}

impl SearchIndex for SqliteSearchIndex {
    fn upsert_document(&self, doc: &SearchDocument) -> Result<(), EntitySyncError> {
        // Conflict resolves as UPDATE so the AU trigger re-aligns the FTS
        // mirror. REPLACE would skip the delete trigger unless
        // recursive_triggers is on.
        self.conn
            .execute(
                "INSERT INTO search_documents(entity_id, owner, kind, name, body, tags) \
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(entity_id) DO UPDATE SET \
                 owner=excluded.owner, kind=excluded.kind, name=excluded.name, \
                 body=excluded.body, tags=excluded.tags",
                params![
                    doc.entity_id,
                    doc.owner.as_str(),
                    doc.kind.as_str(),
                    doc.name.as_str(),
                    doc.body.as_str(),
                    doc.tags.join(" "),
                ],
            )
            .map_err(|e| EntitySyncError::projection(e.to_string()))?;
        Ok(())
    }

    fn delete_document(&self, entity_id: i64) -> Result<(), EntitySyncError> {
        self.conn
            .execute(
                "DELETE FROM search_documents WHERE entity_id=?1",
                params![entity_id],
            )
            .map_err(|e| EntitySyncError::projection(e.to_string()))?;
        Ok(())
    }
}

fn ensure_search_schema(conn: &Connection) -> Result<(), EntitySyncError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS search_documents (
            entity_id INTEGER PRIMARY KEY,
            owner     TEXT NOT NULL,
            kind      TEXT NOT NULL,
            name      TEXT NOT NULL,
            body      TEXT NOT NULL,
            tags      TEXT NOT NULL
        );
        CREATE VIRTUAL TABLE IF NOT EXISTS search_fts USING fts5(
            name,
            body,
            tags,
            content='search_documents',
            content_rowid='entity_id'
        );
        CREATE TRIGGER IF NOT EXISTS search_documents_ai
        AFTER INSERT ON search_documents BEGIN
            INSERT INTO search_fts(rowid, name, body, tags)
            VALUES (new.entity_id, new.name, new.body, new.tags);
        END;
        CREATE TRIGGER IF NOT EXISTS search_documents_ad
        AFTER DELETE ON search_documents BEGIN
            INSERT INTO search_fts(search_fts, rowid, name, body, tags)
            VALUES ('delete', old.entity_id, old.name, old.body, old.tags);
        END;
        CREATE TRIGGER IF NOT EXISTS search_documents_au
        AFTER UPDATE ON search_documents BEGIN
            INSERT INTO search_fts(search_fts, rowid, name, body, tags)
            VALUES ('delete', old.entity_id, old.name, old.body, old.tags);
            INSERT INTO search_fts(rowid, name, body, tags)
            VALUES (new.entity_id, new.name, new.body, new.tags);
        END;
        CREATE INDEX IF NOT EXISTS idx_search_docs_owner ON search_documents(owner);
        "#,
    )
    .map_err(|e| EntitySyncError::schema(e.to_string()))?;
    Ok(())
}

/// Flattens the entity's JSON payload into indexable text: leaf string and
/// number values, space-joined, object keys excluded.
fn flatten_fields(value: &serde_json::Value) -> String {
    let mut parts = Vec::new();
    collect_text(value, &mut parts);
    parts.join(" ")
}

fn collect_text(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Number(n) => out.push(n.to_string()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_text(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_text(item, out);
            }
        }
        serde_json::Value::Bool(_) | serde_json::Value::Null => {}
    }
}
