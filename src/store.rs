use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{
    entity::{Entity, EntityDraft, EntityKind, EntityUpdate, normalized_tags, validate_draft},
    errors::EntitySyncError,
    schema::ensure_schema,
};

/// A stored relation row. Mirrored relations are separate rows; see
/// [`crate::relations`] for the mirroring rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationRow {
    pub id: i64,
    pub owner: String,
    pub from_id: i64,
    pub to_id: i64,
    pub relation_type: String,
}

/// Authoritative relational store. Every mutation in the engine serializes
/// through a commit here before any projection fires.
pub struct EntityStore {
    conn: Connection,
}

impl EntityStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EntitySyncError> {
        let conn =
            Connection::open(path).map_err(|e| EntitySyncError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, EntitySyncError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EntitySyncError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Commits a new entity and returns it with its assigned rowid. Tags are
    /// normalized (trimmed, deduped, sorted) before the write.
    pub fn insert_entity(&self, draft: &EntityDraft) -> Result<Entity, EntitySyncError> {
        validate_draft(draft)?;
        let tags = normalized_tags(&draft.tags);
        let now = now_secs();
        let fields = serde_json::to_string(&draft.fields)
            .map_err(|e| EntitySyncError::invalid_input(e.to_string()))?;
        let tags_json = serde_json::to_string(&tags)
            .map_err(|e| EntitySyncError::invalid_input(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO entities(kind, owner, name, fields, tags, created_at, updated_at) \
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    draft.kind.as_str(),
                    draft.owner.as_str(),
                    draft.name.as_str(),
                    fields,
                    tags_json,
                    now,
                ],
            )
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        Ok(Entity {
            id: self.conn.last_insert_rowid(),
            kind: draft.kind,
            owner: draft.owner.clone(),
            name: draft.name.clone(),
            fields: draft.fields.clone(),
            tags,
            created_at: now,
            updated_at: now,
        })
    }

    /// Owner-scoped lookup. A row owned by someone else reads as missing, so
    /// cross-owner probes cannot distinguish "absent" from "not yours".
    pub fn get_entity(&self, owner: &str, id: i64) -> Result<Entity, EntitySyncError> {
        self.conn
            .query_row(
                "SELECT id, kind, owner, name, fields, tags, created_at, updated_at \
                 FROM entities WHERE id=?1 AND owner=?2",
                params![id, owner],
                |row| row_to_entity(row),
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    EntitySyncError::not_found(format!("entity {id}"))
                }
                other => EntitySyncError::query(other.to_string()),
            })
    }

    pub fn find_by_identity(
        &self,
        owner: &str,
        kind: EntityKind,
        name: &str,
    ) -> Result<Option<Entity>, EntitySyncError> {
        self.conn
            .query_row(
                "SELECT id, kind, owner, name, fields, tags, created_at, updated_at \
                 FROM entities WHERE owner=?1 AND kind=?2 AND name=?3",
                params![owner, kind.as_str(), name],
                |row| row_to_entity(row),
            )
            .optional()
            .map_err(|e| EntitySyncError::query(e.to_string()))
    }

    /// Applies a partial update and returns the committed entity. The caller
    /// snapshots prior tags before invoking this (the change-interceptor
    /// contract); the returned entity carries the post-commit state.
    pub fn update_entity(
        &self,
        current: &Entity,
        update: &EntityUpdate,
    ) -> Result<Entity, EntitySyncError> {
        let mut next = current.clone();
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(EntitySyncError::invalid_input("entity name must be set"));
            }
            next.name = name.clone();
        }
        if let Some(fields) = &update.fields {
            next.fields = fields.clone();
        }
        if let Some(tags) = &update.tags {
            next.tags = normalized_tags(tags);
        }
        next.updated_at = now_secs();
        let fields = serde_json::to_string(&next.fields)
            .map_err(|e| EntitySyncError::invalid_input(e.to_string()))?;
        let tags_json = serde_json::to_string(&next.tags)
            .map_err(|e| EntitySyncError::invalid_input(e.to_string()))?;
        let affected = self
            .conn
            .execute(
                "UPDATE entities SET name=?1, fields=?2, tags=?3, updated_at=?4 \
                 WHERE id=?5 AND owner=?6",
                params![
                    next.name.as_str(),
                    fields,
                    tags_json,
                    next.updated_at,
                    next.id,
                    next.owner.as_str(),
                ],
            )
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        if affected == 0 {
            return Err(EntitySyncError::not_found(format!("entity {}", next.id)));
        }
        Ok(next)
    }

    /// Removes the entity row only. Relation cascade and projection cleanup
    /// are driven by the engine's delete script.
    pub fn delete_entity_row(&self, owner: &str, id: i64) -> Result<(), EntitySyncError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM entities WHERE id=?1 AND owner=?2",
                params![id, owner],
            )
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        if affected == 0 {
            return Err(EntitySyncError::not_found(format!("entity {id}")));
        }
        Ok(())
    }

    /// Resolves a bulk filter to entity ids. Tag matching is exact-path: a
    /// filter tag `Location/US` does not match `Location/US/California`.
    pub fn ids_matching(
        &self,
        owner: &str,
        kind: Option<EntityKind>,
        tag: Option<&str>,
    ) -> Result<Vec<i64>, EntitySyncError> {
        let entities = match kind {
            Some(kind) => self.entities_of_kind(owner, kind)?,
            None => self.all_entities(owner)?,
        };
        let mut ids = Vec::new();
        for entity in entities {
            if let Some(tag) = tag {
                if !entity.tags.iter().any(|t| t == tag) {
                    continue;
                }
            }
            ids.push(entity.id);
        }
        Ok(ids)
    }

    pub fn entities_of_kind(
        &self,
        owner: &str,
        kind: EntityKind,
    ) -> Result<Vec<Entity>, EntitySyncError> {
        self.collect_entities(
            "SELECT id, kind, owner, name, fields, tags, created_at, updated_at \
             FROM entities WHERE owner=?1 AND kind=?2 ORDER BY id",
            params![owner, kind.as_str()],
        )
    }

    pub fn all_entities(&self, owner: &str) -> Result<Vec<Entity>, EntitySyncError> {
        self.collect_entities(
            "SELECT id, kind, owner, name, fields, tags, created_at, updated_at \
             FROM entities WHERE owner=?1 ORDER BY id",
            params![owner],
        )
    }

    pub fn insert_relation(
        &self,
        owner: &str,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<i64, EntitySyncError> {
        self.conn
            .execute(
                "INSERT INTO relations(owner, from_id, to_id, relation_type) \
                 VALUES(?1, ?2, ?3, ?4)",
                params![owner, from_id, to_id, relation_type],
            )
            .map_err(|err| match err {
                rusqlite::Error::SqliteFailure(e, _)
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    EntitySyncError::duplicate(format!(
                        "({from_id}, {to_id}, {relation_type}) already exists"
                    ))
                }
                other => EntitySyncError::query(other.to_string()),
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn relation_exists(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<bool, EntitySyncError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM relations WHERE from_id=?1 AND to_id=?2 AND relation_type=?3",
                params![from_id, to_id, relation_type],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Returns whether a row was removed.
    pub fn delete_relation_row(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<bool, EntitySyncError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM relations WHERE from_id=?1 AND to_id=?2 AND relation_type=?3",
                params![from_id, to_id, relation_type],
            )
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        Ok(affected > 0)
    }

    /// Every relation with the entity in either endpoint position.
    pub fn relations_touching(&self, entity_id: i64) -> Result<Vec<RelationRow>, EntitySyncError> {
        self.collect_relations(
            "SELECT id, owner, from_id, to_id, relation_type FROM relations \
             WHERE from_id=?1 OR to_id=?1 ORDER BY id",
            params![entity_id],
        )
    }

    pub fn all_relations(&self, owner: &str) -> Result<Vec<RelationRow>, EntitySyncError> {
        self.collect_relations(
            "SELECT id, owner, from_id, to_id, relation_type FROM relations \
             WHERE owner=?1 ORDER BY id",
            params![owner],
        )
    }

    pub fn relation_count(&self, owner: &str) -> Result<i64, EntitySyncError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM relations WHERE owner=?1",
                params![owner],
                |row| row.get(0),
            )
            .map_err(|e| EntitySyncError::query(e.to_string()))
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn collect_entities(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<Entity>, EntitySyncError> {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        let rows = stmt
            .query_map(args, |row| row_to_entity(row))
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        let mut entities = Vec::new();
        for entity in rows {
            entities.push(entity.map_err(|e| EntitySyncError::query(e.to_string()))?);
        }
        Ok(entities)
    }

    fn collect_relations(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<RelationRow>, EntitySyncError> {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        let rows = stmt
            .query_map(args, |row| {
                Ok(RelationRow {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    from_id: row.get(2)?,
                    to_id: row.get(3)?,
                    relation_type: row.get(4)?,
                })
            })
            .map_err(|e| EntitySyncError::query(e.to_string()))?;
        let mut relations = Vec::new();
        for relation in rows {
            relations.push(relation.map_err(|e| EntitySyncError::query(e.to_string()))?);
        }
        Ok(relations)
    }
}

fn row_to_entity(row: &rusqlite::Row<'_>) -> Result<Entity, rusqlite::Error> {
    let kind_raw: String = row.get(1)?;
    let kind = EntityKind::parse(&kind_raw).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown entity kind: {kind_raw}").into(),
        )
    })?;
    let fields_raw: String = row.get(4)?;
    let fields: serde_json::Value = serde_json::from_str(&fields_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            fields_raw.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;
    let tags_raw: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            tags_raw.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;
    Ok(Entity {
        id: row.get(0)?,
        kind,
        owner: row.get(2)?,
        name: row.get(3)?,
        fields,
        tags,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
