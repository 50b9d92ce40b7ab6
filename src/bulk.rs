//! Bulk delete: resolve a filter against the authoritative store, then drive
//! the standard single-entity delete path per match. There is no batched
//! side-effect and no global transaction — a mid-batch failure leaves a
//! well-defined processed subset, and re-running the same filter is safe.

use tracing::warn;

use crate::{
    engine::SyncEngine,
    entity::EntityKind,
    errors::EntitySyncError,
    graphstore::GraphStore,
    search::SearchIndex,
};

/// Owner is mandatory; kind and tag narrow the match. Tag matching is
/// exact-path: `Location/US` does not match `Location/US/California`.
#[derive(Debug, Clone)]
pub struct BulkFilter {
    pub owner: String,
    pub kind: Option<EntityKind>,
    pub tag: Option<String>,
}

impl BulkFilter {
    pub fn owner(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            kind: None,
            tag: None,
        }
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub matched: usize,
    pub deleted: usize,
    pub failures: Vec<(i64, String)>,
}

impl BulkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Match count without mutating anything.
pub fn count<S, G>(engine: &SyncEngine<S, G>, filter: &BulkFilter) -> Result<usize, EntitySyncError>
where
    S: SearchIndex,
    G: GraphStore,
{
    Ok(resolve(engine, filter)?.len())
}

/// Deletes every match through the engine's delete script (search removal,
/// graph-node removal, ledger decrement, relation cascade). Per-entity
/// failures are collected, not fatal.
pub fn bulk_delete<S, G>(
    engine: &SyncEngine<S, G>,
    filter: &BulkFilter,
) -> Result<BulkOutcome, EntitySyncError>
where
    S: SearchIndex,
    G: GraphStore,
{
    let ids = resolve(engine, filter)?;
    let mut outcome = BulkOutcome {
        matched: ids.len(),
        ..BulkOutcome::default()
    };
    for id in ids {
        match engine.delete_entity(&filter.owner, id) {
            Ok(_) => outcome.deleted += 1,
            Err(err) => {
                warn!(entity = id, %err, "bulk delete: entity failed, continuing");
                outcome.failures.push((id, err.to_string()));
            }
        }
    }
    Ok(outcome)
}

fn resolve<S, G>(engine: &SyncEngine<S, G>, filter: &BulkFilter) -> Result<Vec<i64>, EntitySyncError>
where
    S: SearchIndex,
    G: GraphStore,
{
    if filter.owner.trim().is_empty() {
        return Err(EntitySyncError::invalid_input("bulk filter owner required"));
    }
    engine
        .store()
        .ids_matching(&filter.owner, filter.kind, filter.tag.as_deref())
}
