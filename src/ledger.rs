//! Tag accounting ledger. Every tag path carries a usage counter that also
//! accumulates descendant usage: an entity tagged `A/B/C` contributes one to
//! `A`, `A/B`, and `A/B/C`. Counters adjust by atomic row-level UPDATE so
//! concurrent mutations on a shared ancestor path cannot lose updates, and
//! rows are never deleted — a path that drops to zero stays available for
//! reuse and for rendering the tag hierarchy.

use std::collections::BTreeSet;

use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{errors::EntitySyncError, store::EntityStore, tags};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub path: String,
    pub count: i64,
}

/// Applies the tag delta of one committed entity write. The diff runs over
/// the expanded sets (every tag plus its ancestors), so each path moves by
/// at most 1 per entity: sibling tags under a shared ancestor, or a tag
/// alongside its own ancestor, still contribute a single count to the shared
/// path. A path covered by both the prior and new set nets to no change.
pub fn adjust(
    store: &EntityStore,
    owner: &str,
    prior_tags: &[String],
    new_tags: &[String],
) -> Result<(), EntitySyncError> {
    let prior: BTreeSet<String> = tags::expand(prior_tags).into_iter().collect();
    let new: BTreeSet<String> = tags::expand(new_tags).into_iter().collect();
    for added in new.difference(&prior) {
        increment(store, owner, added)?;
    }
    for removed in prior.difference(&new) {
        decrement(store, owner, removed)?;
    }
    Ok(())
}

pub fn usage_count(store: &EntityStore, owner: &str, path: &str) -> Result<i64, EntitySyncError> {
    store
        .connection()
        .query_row(
            "SELECT count FROM tag_ledger WHERE owner=?1 AND path=?2",
            params![owner, path],
            |row| row.get(0),
        )
        .optional()
        .map(|opt| opt.unwrap_or(0))
        .map_err(|e| EntitySyncError::query(e.to_string()))
}

/// All ledger entries for an owner, sorted by path. Zero-count entries are
/// included; the hierarchy view depends on them.
pub fn all_entries(store: &EntityStore, owner: &str) -> Result<Vec<LedgerEntry>, EntitySyncError> {
    let mut stmt = store
        .connection()
        .prepare_cached("SELECT path, count FROM tag_ledger WHERE owner=?1 ORDER BY path")
        .map_err(|e| EntitySyncError::query(e.to_string()))?;
    let rows = stmt
        .query_map(params![owner], |row| {
            Ok(LedgerEntry {
                path: row.get(0)?,
                count: row.get(1)?,
            })
        })
        .map_err(|e| EntitySyncError::query(e.to_string()))?;
    let mut entries = Vec::new();
    for entry in rows {
        entries.push(entry.map_err(|e| EntitySyncError::query(e.to_string()))?);
    }
    Ok(entries)
}

/// Ensures ledger rows exist (at zero) for the given paths and their
/// ancestors without touching counts. Used when an import carries known tag
/// paths that no entity currently uses.
pub fn seed_paths(
    store: &EntityStore,
    owner: &str,
    paths: &[String],
) -> Result<(), EntitySyncError> {
    for raw in paths {
        for path in paths_with_ancestors(raw) {
            ensure_row(store, owner, &path)?;
        }
    }
    Ok(())
}

fn increment(store: &EntityStore, owner: &str, path: &str) -> Result<(), EntitySyncError> {
    ensure_row(store, owner, path)?;
    store
        .connection()
        .execute(
            "UPDATE tag_ledger SET count = count + 1 WHERE owner=?1 AND path=?2",
            params![owner, path],
        )
        .map_err(|e| EntitySyncError::query(e.to_string()))?;
    Ok(())
}

fn decrement(store: &EntityStore, owner: &str, path: &str) -> Result<(), EntitySyncError> {
    ensure_row(store, owner, path)?;
    // Clamped at zero: a decrement below zero indicates replayed dispatch,
    // not negative usage.
    store
        .connection()
        .execute(
            "UPDATE tag_ledger SET count = MAX(count - 1, 0) WHERE owner=?1 AND path=?2",
            params![owner, path],
        )
        .map_err(|e| EntitySyncError::query(e.to_string()))?;
    Ok(())
}

fn ensure_row(store: &EntityStore, owner: &str, path: &str) -> Result<(), EntitySyncError> {
    store
        .connection()
        .execute(
            "INSERT OR IGNORE INTO tag_ledger(owner, path, count) VALUES(?1, ?2, 0)",
            params![owner, path],
        )
        .map_err(|e| EntitySyncError::query(e.to_string()))?;
    Ok(())
}

fn paths_with_ancestors(path: &str) -> Vec<String> {
    let mut all = tags::ancestors(path);
    all.push(path.to_string());
    all
}
