use entitysync::{EntityStore, ledger};

fn tags(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[test]
fn test_add_tag_increments_path_and_ancestors() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::adjust(&store, "alice", &[], &tags(&["A/B/C"])).expect("adjust");
    assert_eq!(ledger::usage_count(&store, "alice", "A").expect("count"), 1);
    assert_eq!(ledger::usage_count(&store, "alice", "A/B").expect("count"), 1);
    assert_eq!(
        ledger::usage_count(&store, "alice", "A/B/C").expect("count"),
        1
    );
}

#[test]
fn test_remove_tag_returns_counts_to_zero_but_keeps_entries() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::adjust(&store, "alice", &[], &tags(&["A/B/C"])).expect("add");
    ledger::adjust(&store, "alice", &tags(&["A/B/C"]), &[]).expect("remove");
    let entries = ledger::all_entries(&store, "alice").expect("entries");
    let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["A", "A/B", "A/B/C"]);
    assert!(entries.iter().all(|e| e.count == 0));
}

#[test]
fn test_shared_prefix_accumulates_independently() {
    let store = EntityStore::open_in_memory().expect("store");
    // Two entities under the same ancestor both contribute to it.
    ledger::adjust(&store, "alice", &[], &tags(&["Location/US/California"])).expect("one");
    ledger::adjust(&store, "alice", &[], &tags(&["Location/US/Oregon"])).expect("two");
    assert_eq!(
        ledger::usage_count(&store, "alice", "Location").expect("count"),
        2
    );
    assert_eq!(
        ledger::usage_count(&store, "alice", "Location/US").expect("count"),
        2
    );
    assert_eq!(
        ledger::usage_count(&store, "alice", "Location/US/California").expect("count"),
        1
    );
}

#[test]
fn test_sibling_tags_count_shared_ancestor_once() {
    let store = EntityStore::open_in_memory().expect("store");
    // One entity, two tags under the same ancestor: the ancestor counts the
    // entity, not the tags.
    ledger::adjust(&store, "alice", &[], &tags(&["A/B", "A/C"])).expect("adjust");
    assert_eq!(ledger::usage_count(&store, "alice", "A").expect("count"), 1);
    assert_eq!(ledger::usage_count(&store, "alice", "A/B").expect("count"), 1);
    assert_eq!(ledger::usage_count(&store, "alice", "A/C").expect("count"), 1);
}

#[test]
fn test_tag_alongside_its_own_ancestor_counts_once() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::adjust(&store, "alice", &[], &tags(&["A", "A/B"])).expect("adjust");
    assert_eq!(ledger::usage_count(&store, "alice", "A").expect("count"), 1);
    assert_eq!(ledger::usage_count(&store, "alice", "A/B").expect("count"), 1);
}

#[test]
fn test_overlapping_tags_removed_together_return_to_zero() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::adjust(&store, "alice", &[], &tags(&["A/B", "A/C"])).expect("add");
    ledger::adjust(&store, "alice", &tags(&["A/B", "A/C"]), &[]).expect("remove");
    assert_eq!(ledger::usage_count(&store, "alice", "A").expect("count"), 0);
    assert_eq!(ledger::usage_count(&store, "alice", "A/B").expect("count"), 0);
    assert_eq!(ledger::usage_count(&store, "alice", "A/C").expect("count"), 0);
}

#[test]
fn test_dropping_one_sibling_keeps_shared_ancestor_counted() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::adjust(&store, "alice", &[], &tags(&["A/B", "A/C"])).expect("add");
    // The entity still carries A/C, so A stays at 1.
    ledger::adjust(&store, "alice", &tags(&["A/B", "A/C"]), &tags(&["A/C"])).expect("drop");
    assert_eq!(ledger::usage_count(&store, "alice", "A").expect("count"), 1);
    assert_eq!(ledger::usage_count(&store, "alice", "A/B").expect("count"), 0);
    assert_eq!(ledger::usage_count(&store, "alice", "A/C").expect("count"), 1);
}

#[test]
fn test_unchanged_tag_is_a_no_op() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::adjust(&store, "alice", &[], &tags(&["A/B", "Keep"])).expect("add");
    // "Keep" appears on both sides and must not move.
    ledger::adjust(&store, "alice", &tags(&["A/B", "Keep"]), &tags(&["Keep", "New"]))
        .expect("swap");
    assert_eq!(ledger::usage_count(&store, "alice", "Keep").expect("count"), 1);
    assert_eq!(ledger::usage_count(&store, "alice", "A/B").expect("count"), 0);
    assert_eq!(ledger::usage_count(&store, "alice", "New").expect("count"), 1);
}

#[test]
fn test_decrement_clamps_at_zero() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::adjust(&store, "alice", &tags(&["Never/Added"]), &[]).expect("remove");
    assert_eq!(
        ledger::usage_count(&store, "alice", "Never/Added").expect("count"),
        0
    );
    assert_eq!(ledger::usage_count(&store, "alice", "Never").expect("count"), 0);
}

#[test]
fn test_counts_are_owner_scoped() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::adjust(&store, "alice", &[], &tags(&["Shared/Path"])).expect("alice");
    ledger::adjust(&store, "bob", &[], &tags(&["Shared/Path"])).expect("bob");
    assert_eq!(
        ledger::usage_count(&store, "alice", "Shared/Path").expect("count"),
        1
    );
    assert_eq!(
        ledger::usage_count(&store, "bob", "Shared").expect("count"),
        1
    );
}

#[test]
fn test_special_characters_inside_segments() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::adjust(&store, "alice", &[], &tags(&["Projects/Q3 review (2026)"])).expect("adjust");
    assert_eq!(
        ledger::usage_count(&store, "alice", "Projects/Q3 review (2026)").expect("count"),
        1
    );
    assert_eq!(
        ledger::usage_count(&store, "alice", "Projects").expect("count"),
        1
    );
}

#[test]
fn test_seed_paths_creates_zero_count_rows() {
    let store = EntityStore::open_in_memory().expect("store");
    ledger::seed_paths(&store, "alice", &tags(&["Archive/2025/Q4"])).expect("seed");
    let entries = ledger::all_entries(&store, "alice").expect("entries");
    let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["Archive", "Archive/2025", "Archive/2025/Q4"]);
    assert!(entries.iter().all(|e| e.count == 0));
}
