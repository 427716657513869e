#![forbid(unsafe_code)]

use pf_core::auth::UserContext;
use pf_core::model::{EntityKind, MemoryType, Role};
use pf_tools::{SweepOutcome, ToolError, Toolbox};
use serde_json::json;
use std::path::PathBuf;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn temp_dir(test_name: &str) -> PathBuf {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("pf_tools_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn operator() -> UserContext {
    UserContext::new("system-scheduler", "Scheduler", [Role::Operator])
}

fn analyst() -> UserContext {
    UserContext::new("u_analyst", "Analyst", [Role::Analyst])
}

fn seed_package(toolbox: &mut Toolbox, code: &str) -> String {
    let outcome = toolbox
        .create_package(
            code,
            &format!("Package {code}"),
            json!({}),
            &format!("create-{code}"),
            None,
            &analyst(),
        )
        .expect("create package");
    outcome.value.package.id
}

fn seed_task(toolbox: &mut Toolbox, package_id: &str, due_at_ms: i64, k: &str) -> String {
    let outcome = toolbox
        .create_task(
            package_id,
            "chase the vendor",
            Some(due_at_ms),
            None,
            None,
            &format!("corr-{k}"),
            k,
            &analyst(),
        )
        .expect("create task");
    outcome.value.task.id
}

#[test]
fn sweep_escalates_once_then_replays() {
    let storage_dir = temp_dir("sweep_escalates_once_then_replays");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");
    let package_id = seed_package(&mut toolbox, "PKG-SW");
    seed_task(&mut toolbox, &package_id, DAY_MS, "t1");
    seed_task(&mut toolbox, &package_id, 2 * DAY_MS, "t2");

    let now = 10 * DAY_MS;
    let first = toolbox
        .escalate_overdue(now, None, &operator())
        .expect("first sweep");
    assert_eq!(
        first,
        SweepOutcome {
            overdue: 2,
            escalated: 2,
            replayed: 0
        }
    );

    // Re-running the sweep finds the same tasks still overdue but escalates
    // nothing new.
    let second = toolbox
        .escalate_overdue(now + DAY_MS, None, &operator())
        .expect("second sweep");
    assert_eq!(
        second,
        SweepOutcome {
            overdue: 2,
            escalated: 0,
            replayed: 2
        }
    );
}

#[test]
fn sweep_respects_package_filter() {
    let storage_dir = temp_dir("sweep_respects_package_filter");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");
    let package_a = seed_package(&mut toolbox, "PKG-SA");
    let package_b = seed_package(&mut toolbox, "PKG-SB");
    seed_task(&mut toolbox, &package_a, DAY_MS, "sa");
    let task_b = seed_task(&mut toolbox, &package_b, DAY_MS, "sb");

    let outcome = toolbox
        .escalate_overdue(10 * DAY_MS, Some(package_a.as_str()), &operator())
        .expect("filtered sweep");
    assert_eq!(outcome.escalated, 1);

    let untouched = toolbox.get_task(&task_b, &analyst()).expect("get task");
    assert_eq!(untouched.status, "pending");
}

#[test]
fn missing_entities_map_to_not_found() {
    let storage_dir = temp_dir("missing_entities_map_to_not_found");
    let toolbox = Toolbox::open(&storage_dir).expect("open toolbox");

    let err = toolbox
        .get_package("PKG-999999", &analyst())
        .expect_err("expected not found");
    match err {
        ToolError::NotFound { kind, id } => {
            assert_eq!(kind, "package");
            assert_eq!(id, "PKG-999999");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn malformed_inputs_are_validation_errors() {
    let storage_dir = temp_dir("malformed_inputs_are_validation_errors");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");
    let package_id = seed_package(&mut toolbox, "PKG-VAL");

    let err = toolbox
        .create_package("PKG-K", "Title", json!({}), "bad key", None, &analyst())
        .expect_err("expected key rejection");
    assert!(matches!(err, ToolError::Validation(_)));

    let err = toolbox
        .propose_patch(&package_id, json!("not-an-object"), "why", None, &analyst())
        .expect_err("expected patch rejection");
    assert!(matches!(err, ToolError::Validation(_)));

    let err = toolbox
        .timeline(EntityKind::Package, &package_id, 0, None, &analyst())
        .expect_err("expected limit rejection");
    assert!(matches!(err, ToolError::Validation(_)));
}

#[test]
fn timeline_renders_event_ids_and_timestamps() {
    let storage_dir = temp_dir("timeline_renders_event_ids_and_timestamps");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");
    let package_id = seed_package(&mut toolbox, "PKG-TL");

    let events = toolbox
        .timeline(EntityKind::Package, &package_id, 10, None, &analyst())
        .expect("timeline");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "package_created");
    assert_eq!(events[0].event_id, format!("evt_{:016}", events[0].seq));
    assert!(events[0].created_at.ends_with('Z'));
}

#[test]
fn memory_annotations_flow_through_the_toolbox() {
    let storage_dir = temp_dir("memory_annotations_flow_through_the_toolbox");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");
    let package_id = seed_package(&mut toolbox, "PKG-MEM");

    let stored = toolbox
        .store_memory(
            EntityKind::Package,
            &package_id,
            "vendor call notes",
            MemoryType::Context,
            Some(&package_id),
            None,
            None,
            &analyst(),
        )
        .expect("store memory");
    assert_eq!(stored.created_by, "u_analyst");

    let found = toolbox
        .search_memory(
            EntityKind::Package,
            &package_id,
            Some("vendor"),
            5,
            None,
            &analyst(),
        )
        .expect("search memory");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, stored.id);

    let err = toolbox
        .search_memory(EntityKind::Package, &package_id, None, 0, None, &analyst())
        .expect_err("expected top_k rejection");
    assert!(matches!(err, ToolError::Validation(_)));
}
