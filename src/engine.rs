//! The write-path façade. Every mutation follows the same script: commit to
//! the authoritative store first (the serialization point), then drive the
//! dispatcher. Nothing here rolls the commit back on projection trouble; the
//! receipt says which downstream stores caught up.

use crate::{
    dispatch::{ChangeOp, DispatchOutcome, SyncDispatcher},
    entity::{Entity, EntityDraft, EntityUpdate},
    errors::EntitySyncError,
    graphstore::{Direction, GraphStore, SqliteGraphStore},
    ledger::{self, LedgerEntry},
    relations::{self, RelationTriple, RelationType},
    search::{SearchIndex, SqliteSearchIndex},
    store::EntityStore,
};

/// The committed entity plus the fan-out result for that commit.
#[derive(Debug)]
pub struct SyncReceipt {
    pub entity: Entity,
    pub outcome: DispatchOutcome,
}

pub struct SyncEngine<S, G> {
    store: EntityStore,
    dispatcher: SyncDispatcher<S, G>,
}

impl SyncEngine<SqliteSearchIndex, SqliteGraphStore> {
    /// All three stores in memory; the usual test and embedding setup.
    pub fn in_memory() -> Result<Self, EntitySyncError> {
        let store = EntityStore::open_in_memory()?;
        let dispatcher = SyncDispatcher::new(
            SqliteSearchIndex::open_in_memory()?,
            SqliteGraphStore::open_in_memory()?,
        );
        Ok(Self::new(store, dispatcher))
    }
}

impl<S, G> SyncEngine<S, G>
where
    S: SearchIndex,
    G: GraphStore,
{
    pub fn new(store: EntityStore, dispatcher: SyncDispatcher<S, G>) -> Self {
        Self { store, dispatcher }
    }

    pub fn create_entity(&self, draft: &EntityDraft) -> Result<SyncReceipt, EntitySyncError> {
        let entity = self.store.insert_entity(draft)?;
        let outcome = self.dispatcher.dispatch(&self.store, &entity, &[], ChangeOp::Created);
        Ok(SyncReceipt { entity, outcome })
    }

    pub fn update_entity(
        &self,
        owner: &str,
        id: i64,
        update: &EntityUpdate,
    ) -> Result<SyncReceipt, EntitySyncError> {
        let current = self.store.get_entity(owner, id)?;
        if update.is_empty() {
            return Ok(SyncReceipt {
                entity: current,
                outcome: DispatchOutcome {
                    search_synced: true,
                    graph_synced: true,
                    ledger_synced: true,
                },
            });
        }
        // Interceptor snapshot: the tag set as of the last commit.
        let prior_tags = current.tags.clone();
        let entity = self.store.update_entity(&current, update)?;
        let outcome =
            self.dispatcher
                .dispatch(&self.store, &entity, &prior_tags, ChangeOp::Updated);
        Ok(SyncReceipt { entity, outcome })
    }

    /// Deletes the entity from all three stores and cascades its relations
    /// (mirrors included, since a mirror row touches the entity too).
    pub fn delete_entity(&self, owner: &str, id: i64) -> Result<DispatchOutcome, EntitySyncError> {
        let entity = self.store.get_entity(owner, id)?;
        let removed = relations::cascade(&self.store, id)?;
        for triple in &removed {
            self.dispatcher
                .retract_edge(triple.from_id, triple.to_id, triple.relation_type.as_str());
        }
        self.store.delete_entity_row(owner, id)?;
        let prior_tags = entity.tags.clone();
        Ok(self
            .dispatcher
            .dispatch(&self.store, &entity, &prior_tags, ChangeOp::Deleted))
    }

    /// Re-projects the current committed state of an entity. The ledger leg
    /// is a no-op (prior == new), so this repairs search/graph drift without
    /// disturbing counts.
    pub fn resync_entity(&self, owner: &str, id: i64) -> Result<DispatchOutcome, EntitySyncError> {
        let entity = self.store.get_entity(owner, id)?;
        let prior_tags = entity.tags.clone();
        Ok(self
            .dispatcher
            .dispatch(&self.store, &entity, &prior_tags, ChangeOp::Updated))
    }

    /// Creates the relation (and its mirror, for mirrored types) and projects
    /// the matching graph edges. Validation failures surface synchronously;
    /// edge-projection failures only log.
    pub fn create_relation(
        &self,
        owner: &str,
        from_id: i64,
        to_id: i64,
        relation_type: RelationType,
    ) -> Result<Vec<RelationTriple>, EntitySyncError> {
        let created = relations::create(&self.store, owner, from_id, to_id, relation_type)?;
        for triple in &created {
            self.dispatcher
                .project_edge(triple.from_id, triple.to_id, triple.relation_type.as_str());
        }
        Ok(created)
    }

    pub fn delete_relation(
        &self,
        owner: &str,
        from_id: i64,
        to_id: i64,
        relation_type: RelationType,
    ) -> Result<Vec<RelationTriple>, EntitySyncError> {
        // Owner scoping: a foreign or missing endpoint reads as not found.
        self.store.get_entity(owner, from_id)?;
        let removed = relations::delete(&self.store, from_id, to_id, relation_type)?;
        for triple in &removed {
            self.dispatcher
                .retract_edge(triple.from_id, triple.to_id, triple.relation_type.as_str());
        }
        Ok(removed)
    }

    pub fn get_entity(&self, owner: &str, id: i64) -> Result<Entity, EntitySyncError> {
        self.store.get_entity(owner, id)
    }

    pub fn tag_usage(&self, owner: &str, path: &str) -> Result<i64, EntitySyncError> {
        ledger::usage_count(&self.store, owner, path)
    }

    pub fn tag_entries(&self, owner: &str) -> Result<Vec<LedgerEntry>, EntitySyncError> {
        ledger::all_entries(&self.store, owner)
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &SyncDispatcher<S, G> {
        &self.dispatcher
    }
}

impl<G> SyncEngine<SqliteSearchIndex, G>
where
    G: GraphStore,
{
    /// Owner-scoped full-text search over the projection.
    pub fn search(&self, owner: &str, query: &str) -> Result<Vec<i64>, EntitySyncError> {
        self.dispatcher.search_backend().search(owner, query)
    }
}

impl<S> SyncEngine<S, SqliteGraphStore>
where
    S: SearchIndex,
{
    /// Owner-scoped adjacency read from the graph projection.
    pub fn neighbors(
        &self,
        owner: &str,
        id: i64,
        direction: Direction,
    ) -> Result<Vec<i64>, EntitySyncError> {
        self.store.get_entity(owner, id)?;
        self.dispatcher.graph_backend().neighbors(id, direction)
    }
}
