//! Import/export reconciler. An incoming payload is diffed against current
//! owner-scoped state per record: absent → create, different → update (only
//! changed fields, full dispatch fires), identical → skip (no dispatch).
//! Per-record problems land in the report's error list; the batch never
//! aborts. Relations attach only when both endpoints resolve within the
//! reconciliation scope, otherwise they degrade to warnings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    engine::SyncEngine,
    entity::{Entity, EntityDraft, EntityKind, EntityUpdate},
    errors::EntitySyncError,
    graphstore::GraphStore,
    ledger::{self, LedgerEntry},
    relations::RelationType,
    search::SearchIndex,
    tags,
};

pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRecord {
    pub name: String,
    #[serde(default = "empty_object")]
    pub fields: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Endpoints are identity keys (`"kind:name"`); numeric ids are not stable
/// across datasets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRelation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportPayload {
    pub version: u32,
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<ImportRecord>>,
    #[serde(default)]
    pub relations: Vec<ImportRelation>,
    #[serde(default)]
    pub tags: Vec<LedgerEntry>,
}

impl ImportPayload {
    pub fn empty() -> Self {
        Self {
            version: PAYLOAD_VERSION,
            entities: BTreeMap::new(),
            relations: Vec::new(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl ReconcileCounts {
    fn absorb(&mut self, other: &ReconcileCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub kind: String,
    pub identity: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub per_kind: BTreeMap<String, ReconcileCounts>,
    pub file_summary: BTreeMap<String, usize>,
    pub summary: ReconcileCounts,
    pub relations_created: usize,
    pub errors: Vec<RecordError>,
    pub warnings: Vec<String>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Applies the payload against the owner's current state and returns the
/// aggregated report. Always returns a report unless the payload itself is
/// unusable (unsupported version).
pub fn reconcile<S, G>(
    engine: &SyncEngine<S, G>,
    owner: &str,
    payload: &ImportPayload,
) -> Result<ImportReport, EntitySyncError>
where
    S: SearchIndex,
    G: GraphStore,
{
    if payload.version != PAYLOAD_VERSION {
        return Err(EntitySyncError::invalid_input(format!(
            "unsupported payload version {}",
            payload.version
        )));
    }
    let mut report = ImportReport::default();

    for (kind_raw, records) in &payload.entities {
        report
            .file_summary
            .insert(kind_raw.clone(), records.len());
        let kind = match EntityKind::parse(kind_raw) {
            Ok(kind) => kind,
            Err(err) => {
                report.errors.push(RecordError {
                    kind: kind_raw.clone(),
                    identity: "*".to_string(),
                    message: err.to_string(),
                });
                continue;
            }
        };
        let mut counts = ReconcileCounts::default();
        for record in records {
            match reconcile_record(engine, owner, kind, record, &mut counts) {
                Ok(()) => {}
                Err(err) => report.errors.push(RecordError {
                    kind: kind_raw.clone(),
                    identity: record.name.clone(),
                    message: err.to_string(),
                }),
            }
        }
        report.per_kind.insert(kind_raw.clone(), counts);
    }
    if !payload.relations.is_empty() {
        report
            .file_summary
            .insert("relations".to_string(), payload.relations.len());
    }

    // Known tag paths ride along so the hierarchy survives a round trip even
    // for currently unused labels; counts are re-derived, never imported.
    let seed: Vec<String> = payload.tags.iter().map(|entry| entry.path.clone()).collect();
    ledger::seed_paths(engine.store(), owner, &seed)?;

    for relation in &payload.relations {
        reconcile_relation(engine, owner, relation, &mut report);
    }

    for counts in report.per_kind.values() {
        report.summary.absorb(counts);
    }
    debug!(
        created = report.summary.created,
        updated = report.summary.updated,
        skipped = report.summary.skipped,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "reconcile complete"
    );
    Ok(report)
}

/// Snapshot of the owner's dataset in payload form. Feeding it back through
/// [`reconcile`] reports every record skipped.
pub fn export<S, G>(
    engine: &SyncEngine<S, G>,
    owner: &str,
) -> Result<ImportPayload, EntitySyncError>
where
    S: SearchIndex,
    G: GraphStore,
{
    let mut payload = ImportPayload::empty();
    let mut identities: BTreeMap<i64, String> = BTreeMap::new();
    for entity in engine.store().all_entities(owner)? {
        identities.insert(entity.id, entity.identity());
        payload
            .entities
            .entry(entity.kind.as_str().to_string())
            .or_default()
            .push(ImportRecord {
                name: entity.name.clone(),
                fields: entity.fields.clone(),
                tags: entity.tags.clone(),
            });
    }
    for row in engine.store().all_relations(owner)? {
        let (Some(from), Some(to)) = (identities.get(&row.from_id), identities.get(&row.to_id))
        else {
            continue;
        };
        payload.relations.push(ImportRelation {
            from: from.clone(),
            to: to.clone(),
            relation_type: row.relation_type.clone(),
        });
    }
    payload.tags = ledger::all_entries(engine.store(), owner)?;
    Ok(payload)
}

fn reconcile_record<S, G>(
    engine: &SyncEngine<S, G>,
    owner: &str,
    kind: EntityKind,
    record: &ImportRecord,
    counts: &mut ReconcileCounts,
) -> Result<(), EntitySyncError>
where
    S: SearchIndex,
    G: GraphStore,
{
    if record.name.trim().is_empty() {
        return Err(EntitySyncError::invalid_input("record name must be set"));
    }
    let existing = engine
        .store()
        .find_by_identity(owner, kind, &record.name)?;
    match existing {
        None => {
            let draft = EntityDraft {
                kind,
                owner: owner.to_string(),
                name: record.name.clone(),
                fields: record.fields.clone(),
                tags: record.tags.clone(),
            };
            engine.create_entity(&draft)?;
            counts.created += 1;
        }
        Some(current) => match diff_record(&current, record) {
            Some(update) => {
                engine.update_entity(owner, current.id, &update)?;
                counts.updated += 1;
            }
            // Field-for-field and tag-for-tag identical: the dispatcher is
            // deliberately not invoked.
            None => counts.skipped += 1,
        },
    }
    Ok(())
}

/// Returns the minimal update that brings `current` in line with the record,
/// or `None` when nothing differs.
fn diff_record(current: &Entity, record: &ImportRecord) -> Option<EntityUpdate> {
    let mut update = EntityUpdate::default();
    if current.fields != record.fields {
        update.fields = Some(record.fields.clone());
    }
    let incoming_tags = tags::normalize(&record.tags);
    if current.tags != incoming_tags {
        update.tags = Some(incoming_tags);
    }
    if update.is_empty() { None } else { Some(update) }
}

fn reconcile_relation<S, G>(
    engine: &SyncEngine<S, G>,
    owner: &str,
    relation: &ImportRelation,
    report: &mut ImportReport,
) where
    S: SearchIndex,
    G: GraphStore,
{
    let relation_type = match RelationType::parse(&relation.relation_type) {
        Ok(rt) => rt,
        Err(err) => {
            report.errors.push(RecordError {
                kind: "relations".to_string(),
                identity: format!("{} -> {}", relation.from, relation.to),
                message: err.to_string(),
            });
            return;
        }
    };
    let from = resolve_identity(engine, owner, &relation.from);
    let to = resolve_identity(engine, owner, &relation.to);
    let (Some(from), Some(to)) = (from, to) else {
        report.warnings.push(format!(
            "relation {} {} {} skipped: endpoint not present in dataset",
            relation.from, relation.relation_type, relation.to
        ));
        return;
    };
    match engine.create_relation(owner, from, to, relation_type) {
        Ok(_) => report.relations_created += 1,
        // Already present from an earlier run (or the mirror of one created
        // this run): a no-op, not an anomaly.
        Err(EntitySyncError::Duplicate(_)) => {}
        Err(err) => report.warnings.push(format!(
            "relation {} {} {} skipped: {err}",
            relation.from, relation.relation_type, relation.to
        )),
    }
}

fn resolve_identity<S, G>(engine: &SyncEngine<S, G>, owner: &str, key: &str) -> Option<i64>
where
    S: SearchIndex,
    G: GraphStore,
{
    let (kind_raw, name) = key.split_once(':')?;
    let kind = EntityKind::parse(kind_raw).ok()?;
    let entity = engine.store().find_by_identity(owner, kind, name).ok()??;
    Some(entity.id)
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
