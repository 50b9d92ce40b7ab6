//! Post-commit synchronization dispatcher. Fired once per committed entity
//! write or delete, it fans the change out to the search index, the graph
//! store, and the tag ledger. The authoritative write has already happened:
//! projection failures are logged and reported in the outcome, never
//! propagated, so the caller's mutation stands. Every step is idempotent and
//! a partial outcome can be repaired by re-dispatching the same state.

use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::{
    entity::Entity,
    errors::EntitySyncError,
    graphstore::{GraphNode, GraphStore},
    ledger,
    search::{SearchDocument, SearchIndex},
    store::EntityStore,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOp {
    Created,
    Updated,
    Deleted,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Created => "created",
            ChangeOp::Updated => "updated",
            ChangeOp::Deleted => "deleted",
        }
    }
}

/// Bounded backoff for ledger writes. An unrecorded tag delta is a silent
/// invariant violation, so the ledger gets retries where the projections get
/// a log line.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let capped = exp.min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0..=capped.as_millis().max(1) as u64 / 2);
        capped + Duration::from_millis(jitter)
    }
}

/// Which downstream stores accepted the change. `ledger_synced == false`
/// after retries means the tag-count invariant is at risk for this entity
/// until the state is re-dispatched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub search_synced: bool,
    pub graph_synced: bool,
    pub ledger_synced: bool,
}

impl DispatchOutcome {
    pub fn fully_synced(&self) -> bool {
        self.search_synced && self.graph_synced && self.ledger_synced
    }
}

pub struct SyncDispatcher<S, G> {
    search: S,
    graph: G,
    retry: RetryPolicy,
}

impl<S, G> SyncDispatcher<S, G>
where
    S: SearchIndex,
    G: GraphStore,
{
    pub fn new(search: S, graph: G) -> Self {
        Self {
            search,
            graph,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fans one committed write out to all three downstream stores.
    /// `prior_tags` is the interceptor's pre-commit snapshot (empty for a
    /// create); `entity` carries the post-commit state (for a delete, the
    /// state that was just removed).
    pub fn dispatch(
        &self,
        store: &EntityStore,
        entity: &Entity,
        prior_tags: &[String],
        op: ChangeOp,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let search_result = match op {
            ChangeOp::Created | ChangeOp::Updated => self
                .search
                .upsert_document(&SearchDocument::from_entity(entity)),
            ChangeOp::Deleted => self.search.delete_document(entity.id),
        };
        match search_result {
            Ok(()) => outcome.search_synced = true,
            Err(err) => warn!(
                entity = entity.id,
                op = op.as_str(),
                %err,
                "search projection failed; entity left for re-sync"
            ),
        }

        let graph_result = match op {
            ChangeOp::Created | ChangeOp::Updated => {
                self.graph.upsert_node(&GraphNode::from_entity(entity))
            }
            ChangeOp::Deleted => self.graph.delete_node(entity.id),
        };
        match graph_result {
            Ok(()) => outcome.graph_synced = true,
            Err(err) => warn!(
                entity = entity.id,
                op = op.as_str(),
                %err,
                "graph projection failed; entity left for re-sync"
            ),
        }

        let new_tags: &[String] = match op {
            ChangeOp::Deleted => &[],
            _ => &entity.tags,
        };
        match self.adjust_ledger_with_retry(store, &entity.owner, prior_tags, new_tags) {
            Ok(()) => outcome.ledger_synced = true,
            Err(err) => error!(
                entity = entity.id,
                op = op.as_str(),
                %err,
                "tag ledger adjustment exhausted retries; counts are at risk"
            ),
        }

        debug!(
            entity = entity.id,
            op = op.as_str(),
            fully_synced = outcome.fully_synced(),
            "dispatch complete"
        );
        outcome
    }

    pub fn search_backend(&self) -> &S {
        &self.search
    }

    pub fn graph_backend(&self) -> &G {
        &self.graph
    }

    /// Projects one relation edge. Failures are logged, not propagated; the
    /// relation row is already committed.
    pub(crate) fn project_edge(&self, from_id: i64, to_id: i64, relation_type: &str) {
        if let Err(err) = self.graph.upsert_edge(from_id, to_id, relation_type) {
            warn!(from_id, to_id, relation_type, %err, "edge projection failed");
        }
    }

    pub(crate) fn retract_edge(&self, from_id: i64, to_id: i64, relation_type: &str) {
        if let Err(err) = self.graph.delete_edge(from_id, to_id, relation_type) {
            warn!(from_id, to_id, relation_type, %err, "edge retraction failed");
        }
    }

    fn adjust_ledger_with_retry(
        &self,
        store: &EntityStore,
        owner: &str,
        prior_tags: &[String],
        new_tags: &[String],
    ) -> Result<(), EntitySyncError> {
        let mut last_err = None;
        for attempt in 0..self.retry.attempts.max(1) {
            match ledger::adjust(store, owner, prior_tags, new_tags) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if attempt + 1 < self.retry.attempts.max(1) {
                        let delay = self.retry.delay_for(attempt);
                        warn!(attempt, delay_ms = delay.as_millis() as u64, %err,
                              "ledger adjustment failed; retrying");
                        thread::sleep(delay);
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| EntitySyncError::query("ledger retry loop ran dry")))
    }
}
