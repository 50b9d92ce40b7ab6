//! Relation manager: legality of a relation type for a pair of entity kinds
//! is a static table, and some types mandate an automatically maintained
//! mirror edge. A mirrored create stores two rows on purpose — forward and
//! reverse are independently queryable and independently deletable, while
//! symmetric deletes and cascades remove both together.

use serde::{Deserialize, Serialize};

use crate::{
    entity::{Entity, EntityKind},
    errors::EntitySyncError,
    store::EntityStore,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    IsFriendOf,
    MarriedTo,
    Knows,
    WorksAt,
    Employs,
    ParentOf,
    ChildOf,
    LocatedIn,
    Mentions,
    Depicts,
}

use EntityKind::{Location, Media, Note, Organization, Person};
use RelationType::*;

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsFriendOf => "IS_FRIEND_OF",
            MarriedTo => "MARRIED_TO",
            Knows => "KNOWS",
            WorksAt => "WORKS_AT",
            Employs => "EMPLOYS",
            ParentOf => "PARENT_OF",
            ChildOf => "CHILD_OF",
            LocatedIn => "LOCATED_IN",
            Mentions => "MENTIONS",
            Depicts => "DEPICTS",
        }
    }

    pub fn parse(value: &str) -> Result<Self, EntitySyncError> {
        match value {
            "IS_FRIEND_OF" => Ok(IsFriendOf),
            "MARRIED_TO" => Ok(MarriedTo),
            "KNOWS" => Ok(Knows),
            "WORKS_AT" => Ok(WorksAt),
            "EMPLOYS" => Ok(Employs),
            "PARENT_OF" => Ok(ParentOf),
            "CHILD_OF" => Ok(ChildOf),
            "LOCATED_IN" => Ok(LocatedIn),
            "MENTIONS" => Ok(Mentions),
            "DEPICTS" => Ok(Depicts),
            other => Err(EntitySyncError::invalid_input(format!(
                "unknown relation type: {other}"
            ))),
        }
    }

    /// The automatically maintained reverse type, if this type is mirrored.
    /// Purely symmetric types mirror to themselves; paired types to their
    /// inverse; asymmetric types to nothing.
    pub fn mirror(&self) -> Option<RelationType> {
        match self {
            IsFriendOf => Some(IsFriendOf),
            MarriedTo => Some(MarriedTo),
            ParentOf => Some(ChildOf),
            ChildOf => Some(ParentOf),
            Knows | WorksAt | Employs | LocatedIn | Mentions | Depicts => None,
        }
    }

    pub fn allows(&self, from: EntityKind, to: EntityKind) -> bool {
        self.legal_pairs().contains(&(from, to))
    }

    /// The static validation table: which (from, to) kind pairs each
    /// relation type is legal for.
    fn legal_pairs(&self) -> &'static [(EntityKind, EntityKind)] {
        match self {
            IsFriendOf | MarriedTo | Knows | ParentOf | ChildOf => &[(Person, Person)],
            WorksAt => &[(Person, Organization)],
            Employs => &[(Organization, Person)],
            LocatedIn => &[
                (Person, Location),
                (Organization, Location),
                (Media, Location),
                (Note, Location),
            ],
            Mentions => &[
                (Note, Person),
                (Note, Note),
                (Note, Location),
                (Note, Media),
                (Note, Organization),
            ],
            Depicts => &[(Media, Person), (Media, Location), (Media, Organization)],
        }
    }
}

/// A (from, to, type) triple as stored. Mirror triples are separate values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationTriple {
    pub from_id: i64,
    pub to_id: i64,
    pub relation_type: RelationType,
}

impl RelationTriple {
    fn new(from_id: i64, to_id: i64, relation_type: RelationType) -> Self {
        Self {
            from_id,
            to_id,
            relation_type,
        }
    }

    pub fn mirror(&self) -> Option<RelationTriple> {
        self.relation_type
            .mirror()
            .map(|mirror| RelationTriple::new(self.to_id, self.from_id, mirror))
    }
}

/// Validates endpoints and type legality. Both endpoints must exist for the
/// requesting owner; anything else reads as dangling.
pub fn validate(
    store: &EntityStore,
    owner: &str,
    from_id: i64,
    to_id: i64,
    relation_type: RelationType,
) -> Result<(Entity, Entity), EntitySyncError> {
    if from_id == to_id {
        return Err(EntitySyncError::invalid_input(
            "relation endpoints must differ",
        ));
    }
    let from = store
        .get_entity(owner, from_id)
        .map_err(|_| EntitySyncError::dangling(format!("from entity {from_id}")))?;
    let to = store
        .get_entity(owner, to_id)
        .map_err(|_| EntitySyncError::dangling(format!("to entity {to_id}")))?;
    if !relation_type.allows(from.kind, to.kind) {
        return Err(EntitySyncError::type_mismatch(format!(
            "{} is not legal for ({}, {})",
            relation_type.as_str(),
            from.kind.as_str(),
            to.kind.as_str(),
        )));
    }
    Ok((from, to))
}

/// Creates the relation row plus, for mirrored types, its reverse row
/// (idempotently). Returns every triple actually inserted so the caller can
/// project the matching graph edges.
pub fn create(
    store: &EntityStore,
    owner: &str,
    from_id: i64,
    to_id: i64,
    relation_type: RelationType,
) -> Result<Vec<RelationTriple>, EntitySyncError> {
    validate(store, owner, from_id, to_id, relation_type)?;
    if store.relation_exists(from_id, to_id, relation_type.as_str())? {
        return Err(EntitySyncError::duplicate(format!(
            "({from_id}, {to_id}, {}) already exists",
            relation_type.as_str()
        )));
    }
    let forward = RelationTriple::new(from_id, to_id, relation_type);
    store.insert_relation(owner, from_id, to_id, relation_type.as_str())?;
    let mut created = vec![forward.clone()];
    if let Some(mirror) = forward.mirror() {
        if !store.relation_exists(mirror.from_id, mirror.to_id, mirror.relation_type.as_str())? {
            store.insert_relation(
                owner,
                mirror.from_id,
                mirror.to_id,
                mirror.relation_type.as_str(),
            )?;
            created.push(mirror);
        }
    }
    Ok(created)
}

/// Deletes the triple and, for mirrored types, its reverse. Returns every
/// triple actually removed.
pub fn delete(
    store: &EntityStore,
    from_id: i64,
    to_id: i64,
    relation_type: RelationType,
) -> Result<Vec<RelationTriple>, EntitySyncError> {
    let forward = RelationTriple::new(from_id, to_id, relation_type);
    if !store.delete_relation_row(from_id, to_id, relation_type.as_str())? {
        return Err(EntitySyncError::not_found(format!(
            "relation ({from_id}, {to_id}, {})",
            relation_type.as_str()
        )));
    }
    let mut removed = vec![forward.clone()];
    if let Some(mirror) = forward.mirror() {
        if store.delete_relation_row(mirror.from_id, mirror.to_id, mirror.relation_type.as_str())? {
            removed.push(mirror);
        }
    }
    Ok(removed)
}

/// Removes every relation touching the entity in either endpoint position.
/// Mirror rows touch the entity too, so one sweep catches them; each removed
/// triple is returned for graph-edge cleanup.
pub fn cascade(store: &EntityStore, entity_id: i64) -> Result<Vec<RelationTriple>, EntitySyncError> {
    let mut removed = Vec::new();
    for row in store.relations_touching(entity_id)? {
        let relation_type = RelationType::parse(&row.relation_type)?;
        if store.delete_relation_row(row.from_id, row.to_id, &row.relation_type)? {
            removed.push(RelationTriple::new(row.from_id, row.to_id, relation_type));
        }
    }
    Ok(removed)
}
