//! Graph store projection: one node per entity, one edge per stored relation
//! row. Mirrored relation rows therefore project as two edges, matching the
//! relational store's raw counts.

use std::path::Path;

use ahash::AHashMap;
use parking_lot::RwLock;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{entity::Entity, errors::EntitySyncError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub entity_id: i64,
    pub owner: String,
    pub kind: String,
    pub name: String,
}

impl GraphNode {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            entity_id: entity.id,
            owner: entity.owner.clone(),
            kind: entity.kind.as_str().to_string(),
            name: entity.name.clone(),
        }
    }
}

/// Write-path contract of the graph store. All operations are idempotent;
/// `delete_node` also removes incident edges.
pub trait GraphStore {
    fn upsert_node(&self, node: &GraphNode) -> Result<(), EntitySyncError>;
    fn delete_node(&self, entity_id: i64) -> Result<(), EntitySyncError>;
    fn upsert_edge(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<(), EntitySyncError>;
    fn delete_edge(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<(), EntitySyncError>;
}

#[derive(Default)]
struct AdjacencyCache {
    inner: RwLock<AHashMap<i64, Vec<i64>>>,
}

impl AdjacencyCache {
    fn get(&self, key: i64) -> Option<Vec<i64>> {
        self.inner.read().get(&key).cloned()
    }

    fn insert(&self, key: i64, value: Vec<i64>) {
        self.inner.write().insert(key, value);
    }

    fn clear(&self) {
        self.inner.write().clear();
    }
}

pub struct SqliteGraphStore {
    conn: Connection,
    outgoing_cache: AdjacencyCache,
    incoming_cache: AdjacencyCache,
}

impl SqliteGraphStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EntitySyncError> {
        let conn =
            Connection::open(path).map_err(|e| EntitySyncError::connection(e.to_string()))?;
        ensure_graph_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, EntitySyncError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EntitySyncError::connection(e.to_string()))?;
        ensure_graph_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn node_exists(&self, entity_id: i64) -> Result<bool, EntitySyncError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM graph_nodes WHERE entity_id=?1",
                params![entity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Adjacent entity ids in the given direction, sorted, cached until the
    /// next mutation.
    pub fn neighbors(
        &self,
        entity_id: i64,
        direction: Direction,
    ) -> Result<Vec<i64>, EntitySyncError> {
        let cache = match direction {
            Direction::Outgoing => &self.outgoing_cache,
            Direction::Incoming => &self.incoming_cache,
        };
        if let Some(cached) = cache.get(entity_id) {
            return Ok(cached);
        }
        let sql = match direction {
            Direction::Outgoing => {
                "SELECT to_id FROM graph_edges WHERE from_id=?1 ORDER BY to_id, relation_type"
            }
            Direction::Incoming => {
                "SELECT from_id FROM graph_edges WHERE to_id=?1 ORDER BY from_id, relation_type"
            }
        };
        let result = self.collect_ids(sql, entity_id)?;
        cache.insert(entity_id, result.clone());
        Ok(result)
    }

    pub fn edge_count(&self, owner: &str) -> Result<i64, EntitySyncError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM graph_edges e \
                 JOIN graph_nodes n ON n.entity_id = e.from_id \
                 WHERE n.owner=?1",
                params![owner],
                |row| row.get(0),
            )
            .map_err(|e| EntitySyncError::query(e.to_string()))
    }

    pub fn node_count(&self, owner: &str) -> Result<i64, EntitySyncError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM graph_nodes WHERE owner=?1",
                params![owner],
                |row| row.get(0),
            )
            .map_err(|e| EntitySyncError::query(e.to_string()))
    }

    fn collect_ids(&self, sql: &str, id: i64) -> Result<Vec<i64>, EntitySyncError> {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![id], |row| row.get(0))
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        let mut ids = Vec::new();
        for item in rows {
            ids.push(item.map_err(|e| EntitySyncError::query(e.to_string()))?);
        }
        Ok(ids)
    }

    fn invalidate_caches(&self) {
        self.outgoing_cache.clear();
        self.incoming_cache.clear();
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            outgoing_cache: AdjacencyCache::default(),
            incoming_cache: AdjacencyCache::default(),
        }
    }
}

impl GraphStore for SqliteGraphStore {
    fn upsert_node(&self, node: &GraphNode) -> Result<(), EntitySyncError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO graph_nodes(entity_id, owner, kind, name) \
                 VALUES(?1, ?2, ?3, ?4)",
                params![
                    node.entity_id,
                    node.owner.as_str(),
                    node.kind.as_str(),
                    node.name.as_str(),
                ],
            )
            .map_err(|e| EntitySyncError::projection(e.to_string()))?;
        self.invalidate_caches();
        Ok(())
    }

    fn delete_node(&self, entity_id: i64) -> Result<(), EntitySyncError> {
        self.conn
            .execute(
                "DELETE FROM graph_nodes WHERE entity_id=?1",
                params![entity_id],
            )
            .map_err(|e| EntitySyncError::projection(e.to_string()))?;
        self.conn
            .execute(
                "DELETE FROM graph_edges WHERE from_id=?1 OR to_id=?1",
                params![entity_id],
            )
            .map_err(|e| EntitySyncError::projection(e.to_string()))?;
        self.invalidate_caches();
        Ok(())
    }

    fn upsert_edge(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<(), EntitySyncError> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO graph_edges(from_id, to_id, relation_type) \
                 VALUES(?1, ?2, ?3)",
                params![from_id, to_id, relation_type],
            )
            .map_err(|e| EntitySyncError::projection(e.to_string()))?;
        self.invalidate_caches();
        Ok(())
    }

    fn delete_edge(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<(), EntitySyncError> {
        self.conn
            .execute(
                "DELETE FROM graph_edges WHERE from_id=?1 AND to_id=?2 AND relation_type=?3",
                params![from_id, to_id, relation_type],
            )
            .map_err(|e| EntitySyncError::projection(e.to_string()))?;
        self.invalidate_caches();
        Ok(())
    }
}

fn ensure_graph_schema(conn: &Connection) -> Result<(), EntitySyncError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS graph_nodes (
            entity_id INTEGER PRIMARY KEY,
            owner     TEXT NOT NULL,
            kind      TEXT NOT NULL,
            name      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_edges (
            from_id       INTEGER NOT NULL,
            to_id         INTEGER NOT NULL,
            relation_type TEXT NOT NULL,
            UNIQUE(from_id, to_id, relation_type)
        );
        CREATE INDEX IF NOT EXISTS idx_graph_edges_from ON graph_edges(from_id);
        CREATE INDEX IF NOT EXISTS idx_graph_edges_to ON graph_edges(to_id);
        CREATE INDEX IF NOT EXISTS idx_graph_nodes_owner ON graph_nodes(owner);
        "#,
    )
    .map_err(|e| EntitySyncError::schema(e.to_string()))?;
    Ok(())
}
