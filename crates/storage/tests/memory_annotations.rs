#![forbid(unsafe_code)]

use pf_core::model::{EntityKind, MemoryType};
use pf_storage::{SearchMemoryRequest, SqliteStore, StoreError, StoreMemoryRequest};
use serde_json::json;
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("pf_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn store_note(
    store: &mut SqliteStore,
    entity_id: &str,
    content: &str,
    memory_type: MemoryType,
) -> String {
    let memory = store
        .memory_store(StoreMemoryRequest {
            entity_kind: EntityKind::Package,
            entity_id: entity_id.to_string(),
            content: content.to_string(),
            memory_type,
            package_id: Some(entity_id.to_string()),
            metadata: None,
            source_refs: None,
            created_by: "analyst-1".to_string(),
        })
        .expect("store memory");
    memory.id
}

#[test]
fn memory_round_trips_metadata_and_refs() {
    let storage_dir = temp_dir("memory_round_trips_metadata_and_refs");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let stored = store
        .memory_store(StoreMemoryRequest {
            entity_kind: EntityKind::Package,
            entity_id: "PKG-000001".to_string(),
            content: "vendor prefers email over portal".to_string(),
            memory_type: MemoryType::Context,
            package_id: Some("PKG-000001".to_string()),
            metadata: Some(json!({"confidence": "high"})),
            source_refs: Some(vec!["evt_0000000000000003".to_string()]),
            created_by: "analyst-1".to_string(),
        })
        .expect("store memory");
    assert!(stored.id.starts_with("MEM-"));

    let found = store
        .memory_search(SearchMemoryRequest {
            entity_kind: EntityKind::Package,
            entity_id: "PKG-000001".to_string(),
            query: None,
            top_k: 10,
            memory_type: None,
        })
        .expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], stored);
}

#[test]
fn search_filters_by_type_and_substring() {
    let storage_dir = temp_dir("search_filters_by_type_and_substring");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    store_note(&mut store, "PKG-1", "budget confirmed by finance", MemoryType::Decision);
    store_note(&mut store, "PKG-1", "vendor asked about budget ceiling", MemoryType::Context);
    store_note(&mut store, "PKG-1", "timeline risk flagged", MemoryType::Analysis);
    store_note(&mut store, "PKG-2", "budget note on another package", MemoryType::Context);

    let by_type = store
        .memory_search(SearchMemoryRequest {
            entity_kind: EntityKind::Package,
            entity_id: "PKG-1".to_string(),
            query: None,
            top_k: 10,
            memory_type: Some(MemoryType::Context),
        })
        .expect("search by type");
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type[0].memory_type, "context");

    let by_query = store
        .memory_search(SearchMemoryRequest {
            entity_kind: EntityKind::Package,
            entity_id: "PKG-1".to_string(),
            query: Some("budget".to_string()),
            top_k: 10,
            memory_type: None,
        })
        .expect("search by query");
    assert_eq!(by_query.len(), 2);
    assert!(by_query.iter().all(|m| m.content.contains("budget")));
    assert!(by_query.iter().all(|m| m.entity_id == "PKG-1"));
}

#[test]
fn search_is_bounded_and_newest_first() {
    let storage_dir = temp_dir("search_is_bounded_and_newest_first");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(store_note(
            &mut store,
            "PKG-1",
            &format!("note {i}"),
            MemoryType::Context,
        ));
    }

    let found = store
        .memory_search(SearchMemoryRequest {
            entity_kind: EntityKind::Package,
            entity_id: "PKG-1".to_string(),
            query: None,
            top_k: 3,
            memory_type: None,
        })
        .expect("search");
    assert_eq!(found.len(), 3);
    // Insertion order ties on created_at_ms resolve by rowid, newest first.
    assert_eq!(found[0].id, ids[4]);
    assert_eq!(found[1].id, ids[3]);
    assert_eq!(found[2].id, ids[2]);
}

#[test]
fn empty_content_and_zero_top_k_are_rejected() {
    let storage_dir = temp_dir("empty_content_and_zero_top_k_are_rejected");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let err = store
        .memory_store(StoreMemoryRequest {
            entity_kind: EntityKind::Package,
            entity_id: "PKG-1".to_string(),
            content: "  ".to_string(),
            memory_type: MemoryType::Context,
            package_id: None,
            metadata: None,
            source_refs: None,
            created_by: "analyst-1".to_string(),
        })
        .expect_err("expected empty content");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let err = store
        .memory_search(SearchMemoryRequest {
            entity_kind: EntityKind::Package,
            entity_id: "PKG-1".to_string(),
            query: None,
            top_k: 0,
            memory_type: None,
        })
        .expect_err("expected invalid top_k");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}
