use entitysync::{
    Direction, EntityDraft, EntityKind, EntitySyncError, RelationType, SyncEngine,
};

fn engine_with_people(names: &[&str]) -> (SyncEngine<entitysync::SqliteSearchIndex, entitysync::SqliteGraphStore>, Vec<i64>) {
    let engine = SyncEngine::in_memory().expect("engine");
    let mut ids = Vec::new();
    for name in names {
        let receipt = engine
            .create_entity(&EntityDraft::new(EntityKind::Person, "alice", name))
            .expect("person");
        ids.push(receipt.entity.id);
    }
    (engine, ids)
}

#[test]
fn test_works_at_legal_for_person_to_organization() {
    let (engine, ids) = engine_with_people(&["Bob"]);
    let org = engine
        .create_entity(&EntityDraft::new(EntityKind::Organization, "alice", "Acme"))
        .expect("org");
    let created = engine
        .create_relation("alice", ids[0], org.entity.id, RelationType::WorksAt)
        .expect("works_at");
    assert_eq!(created.len(), 1);
}

#[test]
fn test_friend_relation_rejects_organization_endpoint() {
    let (engine, ids) = engine_with_people(&["Bob"]);
    let org = engine
        .create_entity(&EntityDraft::new(EntityKind::Organization, "alice", "Acme"))
        .expect("org");
    let err = engine
        .create_relation("alice", ids[0], org.entity.id, RelationType::IsFriendOf)
        .expect_err("mismatch");
    assert!(matches!(err, EntitySyncError::TypeMismatch(_)));
}

#[test]
fn test_dangling_endpoint_rejected() {
    let (engine, ids) = engine_with_people(&["Bob"]);
    let err = engine
        .create_relation("alice", ids[0], 9999, RelationType::Knows)
        .expect_err("dangling");
    assert!(matches!(err, EntitySyncError::DanglingReference(_)));
}

#[test]
fn test_foreign_owner_endpoint_reads_as_dangling() {
    let (engine, ids) = engine_with_people(&["Bob"]);
    let foreign = engine
        .create_entity(&EntityDraft::new(EntityKind::Person, "mallory", "Eve"))
        .expect("foreign");
    let err = engine
        .create_relation("alice", ids[0], foreign.entity.id, RelationType::Knows)
        .expect_err("scoped");
    assert!(matches!(err, EntitySyncError::DanglingReference(_)));
}

#[test]
fn test_duplicate_triple_rejected() {
    let (engine, ids) = engine_with_people(&["Bob", "Carol"]);
    engine
        .create_relation("alice", ids[0], ids[1], RelationType::Knows)
        .expect("first");
    let err = engine
        .create_relation("alice", ids[0], ids[1], RelationType::Knows)
        .expect_err("duplicate");
    assert!(matches!(err, EntitySyncError::Duplicate(_)));
}

#[test]
fn test_symmetric_create_stores_mirror_row() {
    let (engine, ids) = engine_with_people(&["Bob", "Carol"]);
    let created = engine
        .create_relation("alice", ids[0], ids[1], RelationType::IsFriendOf)
        .expect("friend");
    assert_eq!(created.len(), 2);
    assert!(
        engine
            .store()
            .relation_exists(ids[1], ids[0], "IS_FRIEND_OF")
            .expect("mirror")
    );
}

#[test]
fn test_paired_type_mirrors_to_inverse() {
    let (engine, ids) = engine_with_people(&["Parent", "Child"]);
    engine
        .create_relation("alice", ids[0], ids[1], RelationType::ParentOf)
        .expect("parent_of");
    assert!(
        engine
            .store()
            .relation_exists(ids[1], ids[0], "CHILD_OF")
            .expect("child_of")
    );
}

#[test]
fn test_asymmetric_type_creates_no_mirror() {
    let (engine, ids) = engine_with_people(&["Bob", "Carol"]);
    engine
        .create_relation("alice", ids[0], ids[1], RelationType::Knows)
        .expect("knows");
    assert!(
        !engine
            .store()
            .relation_exists(ids[1], ids[0], "KNOWS")
            .expect("no mirror")
    );
    assert_eq!(engine.store().relation_count("alice").expect("count"), 1);
}

#[test]
fn test_friend_chain_doubles_stored_count() {
    // 4 symmetric edges among 5 people store 8 rows: forward plus mirror.
    let (engine, ids) = engine_with_people(&["a", "b", "c", "d", "e"]);
    for pair in ids.windows(2) {
        engine
            .create_relation("alice", pair[0], pair[1], RelationType::IsFriendOf)
            .expect("friend");
    }
    assert_eq!(engine.store().relation_count("alice").expect("count"), 8);
    assert_eq!(
        engine
            .dispatcher()
            .graph_backend()
            .edge_count("alice")
            .expect("edges"),
        8
    );
}

#[test]
fn test_delete_symmetric_relation_removes_mirror() {
    let (engine, ids) = engine_with_people(&["Bob", "Carol"]);
    engine
        .create_relation("alice", ids[0], ids[1], RelationType::MarriedTo)
        .expect("marry");
    let removed = engine
        .delete_relation("alice", ids[0], ids[1], RelationType::MarriedTo)
        .expect("divorce");
    assert_eq!(removed.len(), 2);
    assert_eq!(engine.store().relation_count("alice").expect("count"), 0);
    assert!(
        engine
            .neighbors("alice", ids[1], Direction::Outgoing)
            .expect("neighbors")
            .is_empty()
    );
}

#[test]
fn test_deleting_mirror_side_removes_forward_row() {
    let (engine, ids) = engine_with_people(&["Bob", "Carol"]);
    engine
        .create_relation("alice", ids[0], ids[1], RelationType::IsFriendOf)
        .expect("friend");
    // Deleting the reverse row takes the forward one with it.
    engine
        .delete_relation("alice", ids[1], ids[0], RelationType::IsFriendOf)
        .expect("delete mirror side");
    assert_eq!(engine.store().relation_count("alice").expect("count"), 0);
}

#[test]
fn test_self_relation_rejected() {
    let (engine, ids) = engine_with_people(&["Bob"]);
    let err = engine
        .create_relation("alice", ids[0], ids[0], RelationType::Knows)
        .expect_err("self");
    assert!(matches!(err, EntitySyncError::InvalidInput(_)));
}

#[test]
fn test_entity_delete_cascades_all_touching_relations() {
    let (engine, ids) = engine_with_people(&["Bob", "Carol", "Dave"]);
    engine
        .create_relation("alice", ids[0], ids[1], RelationType::IsFriendOf)
        .expect("friend");
    engine
        .create_relation("alice", ids[2], ids[0], RelationType::Knows)
        .expect("knows");
    engine.delete_entity("alice", ids[0]).expect("delete");
    // Zero relation rows reference the deleted entity in either position.
    for row in engine.store().all_relations("alice").expect("rows") {
        assert_ne!(row.from_id, ids[0]);
        assert_ne!(row.to_id, ids[0]);
    }
    assert_eq!(engine.store().relation_count("alice").expect("count"), 0);
}

#[test]
fn test_relation_type_parse_roundtrip() {
    for raw in [
        "IS_FRIEND_OF",
        "MARRIED_TO",
        "KNOWS",
        "WORKS_AT",
        "EMPLOYS",
        "PARENT_OF",
        "CHILD_OF",
        "LOCATED_IN",
        "MENTIONS",
        "DEPICTS",
    ] {
        let parsed = RelationType::parse(raw).expect("parse");
        assert_eq!(parsed.as_str(), raw);
    }
    assert!(RelationType::parse("BESTIES_WITH").is_err());
}
