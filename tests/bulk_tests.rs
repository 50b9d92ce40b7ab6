use entitysync::{
    BulkFilter, EntityDraft, EntityKind, RelationType, SqliteGraphStore, SqliteSearchIndex,
    SyncEngine, bulk,
};
use serde_json::json;

type Engine = SyncEngine<SqliteSearchIndex, SqliteGraphStore>;

fn seeded_engine() -> Engine {
    let engine = SyncEngine::in_memory().expect("engine");
    for (kind, name, tags) in [
        (EntityKind::Person, "Bob", vec!["Team/Platform"]),
        (EntityKind::Person, "Carol", vec!["Team/Platform"]),
        (EntityKind::Note, "memo", vec!["Team/Platform", "Archive"]),
        (EntityKind::Note, "scratch", vec!["Archive"]),
        (EntityKind::Location, "HQ", vec![]),
    ] {
        let tag_refs: Vec<&str> = tags.iter().copied().collect();
        engine
            .create_entity(
                &EntityDraft::new(kind, "alice", name)
                    .with_fields(json!({ "label": name }))
                    .with_tags(&tag_refs),
            )
            .expect("seed");
    }
    engine
}

#[test]
fn test_count_does_not_mutate() {
    let engine = seeded_engine();
    let filter = BulkFilter::owner("alice").with_tag("Archive");
    assert_eq!(bulk::count(&engine, &filter).expect("count"), 2);
    assert_eq!(engine.store().all_entities("alice").expect("all").len(), 5);
}

#[test]
fn test_bulk_delete_by_kind() {
    let engine = seeded_engine();
    let outcome = bulk::bulk_delete(
        &engine,
        &BulkFilter::owner("alice").with_kind(EntityKind::Person),
    )
    .expect("bulk");
    assert_eq!(outcome.matched, 2);
    assert_eq!(outcome.deleted, 2);
    assert!(outcome.is_complete());
    let remaining = engine.store().all_entities("alice").expect("all");
    assert!(remaining.iter().all(|e| e.kind != EntityKind::Person));
}

#[test]
fn test_bulk_delete_tag_filter_is_exact_path() {
    let engine = SyncEngine::in_memory().expect("engine");
    engine
        .create_entity(
            &EntityDraft::new(EntityKind::Location, "alice", "US office")
                .with_tags(&["Location/US"]),
        )
        .expect("direct");
    let nested = engine
        .create_entity(
            &EntityDraft::new(EntityKind::Location, "alice", "CA office")
                .with_tags(&["Location/US/California"]),
        )
        .expect("nested");
    let outcome = bulk::bulk_delete(
        &engine,
        &BulkFilter::owner("alice").with_tag("Location/US"),
    )
    .expect("bulk");
    assert_eq!(outcome.deleted, 1);
    // The descendant-tagged entity is untouched.
    engine
        .get_entity("alice", nested.entity.id)
        .expect("survives");
    // The ancestor count drops by exactly the direct matches; the surviving
    // descendant still contributes one.
    assert_eq!(engine.tag_usage("alice", "Location/US").expect("count"), 1);
}

#[test]
fn test_bulk_delete_decrements_ancestor_once_per_entity() {
    let engine = SyncEngine::in_memory().expect("engine");
    // This entity carries an ancestor path and one of its descendants; it
    // still counts once toward the ancestor, in and out.
    engine
        .create_entity(
            &EntityDraft::new(EntityKind::Location, "alice", "US office")
                .with_tags(&["Location/US", "Location/US/NY"]),
        )
        .expect("direct");
    engine
        .create_entity(
            &EntityDraft::new(EntityKind::Location, "alice", "CA office")
                .with_tags(&["Location/US/California"]),
        )
        .expect("nested");
    assert_eq!(engine.tag_usage("alice", "Location/US").expect("count"), 2);

    let outcome = bulk::bulk_delete(
        &engine,
        &BulkFilter::owner("alice").with_tag("Location/US"),
    )
    .expect("bulk");
    assert_eq!(outcome.deleted, 1);
    assert_eq!(engine.tag_usage("alice", "Location/US").expect("count"), 1);
    assert_eq!(engine.tag_usage("alice", "Location").expect("count"), 1);
}

#[test]
fn test_bulk_delete_cleans_all_three_stores_and_relations() {
    let engine = seeded_engine();
    let bob = engine
        .store()
        .find_by_identity("alice", EntityKind::Person, "Bob")
        .expect("lookup")
        .expect("bob");
    let carol = engine
        .store()
        .find_by_identity("alice", EntityKind::Person, "Carol")
        .expect("lookup")
        .expect("carol");
    engine
        .create_relation("alice", bob.id, carol.id, RelationType::IsFriendOf)
        .expect("friend");

    let outcome = bulk::bulk_delete(
        &engine,
        &BulkFilter::owner("alice").with_tag("Team/Platform"),
    )
    .expect("bulk");
    assert_eq!(outcome.deleted, 3);
    assert_eq!(engine.store().relation_count("alice").expect("count"), 0);
    for id in [bob.id, carol.id] {
        assert!(!engine.dispatcher().search_backend().contains(id).expect("search"));
        assert!(!engine.dispatcher().graph_backend().node_exists(id).expect("graph"));
    }
    assert_eq!(engine.tag_usage("alice", "Team/Platform").expect("count"), 0);
    assert_eq!(engine.tag_usage("alice", "Team").expect("count"), 0);
}

#[test]
fn test_bulk_delete_is_rerunnable() {
    let engine = seeded_engine();
    let filter = BulkFilter::owner("alice").with_tag("Archive");
    let first = bulk::bulk_delete(&engine, &filter).expect("first");
    assert_eq!(first.deleted, 2);
    let second = bulk::bulk_delete(&engine, &filter).expect("second");
    assert_eq!(second.matched, 0);
    assert_eq!(second.deleted, 0);
    assert!(second.is_complete());
}

#[test]
fn test_bulk_delete_is_owner_scoped() {
    let engine = seeded_engine();
    engine
        .create_entity(&EntityDraft::new(EntityKind::Note, "bob", "memo").with_tags(&["Archive"]))
        .expect("other owner");
    bulk::bulk_delete(&engine, &BulkFilter::owner("alice").with_tag("Archive")).expect("bulk");
    assert_eq!(engine.store().all_entities("bob").expect("all").len(), 1);
}

#[test]
fn test_blank_owner_rejected() {
    let engine = seeded_engine();
    let err = bulk::count(&engine, &BulkFilter::owner(" ")).expect_err("owner");
    assert!(matches!(err, entitysync::EntitySyncError::InvalidInput(_)));
}
