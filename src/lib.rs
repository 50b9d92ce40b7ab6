//! SQLite-backed entity synchronization and tag accounting engine: one
//! authoritative relational store fanned out to an FTS5 search index and a
//! graph store, with hierarchical tag-usage counters and a validated,
//! sometimes-mirrored relation graph.

pub mod bulk;
pub mod dispatch;
pub mod engine;
pub mod entity;
pub mod errors;
pub mod graphstore;
pub mod ledger;
pub mod reconcile;
pub mod relations;
pub mod schema;
pub mod search;
pub mod store;
pub mod tags;

pub use crate::bulk::{BulkFilter, BulkOutcome};
pub use crate::dispatch::{ChangeOp, DispatchOutcome, RetryPolicy, SyncDispatcher};
pub use crate::engine::{SyncEngine, SyncReceipt};
pub use crate::entity::{Entity, EntityDraft, EntityKind, EntityUpdate};
pub use crate::errors::EntitySyncError;
pub use crate::graphstore::{Direction, GraphNode, GraphStore, SqliteGraphStore};
pub use crate::ledger::LedgerEntry;
pub use crate::reconcile::{ImportPayload, ImportRecord, ImportRelation, ImportReport};
pub use crate::relations::{RelationTriple, RelationType};
pub use crate::search::{SearchDocument, SearchIndex, SqliteSearchIndex};
pub use crate::store::{EntityStore, RelationRow};
