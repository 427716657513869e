#![forbid(unsafe_code)]

use pf_core::auth::UserContext;
use pf_core::model::{Decision, EntityKind, Role};
use pf_tools::{ToolError, Toolbox};
use serde_json::json;
use std::path::PathBuf;

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

fn admin() -> UserContext {
    UserContext::new("u_admin", "Admin", [Role::Admin])
}

fn analyst() -> UserContext {
    UserContext::new("u_analyst", "Analyst", [Role::Analyst])
}

#[test]
fn propose_approve_round_trip_through_the_toolbox() {
    let storage_dir = temp_dir("propose_approve_round_trip_through_the_toolbox");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");

    let created = toolbox
        .create_package(
            "PKG-RT",
            "Round trip",
            json!({"status": "pending", "owner": "X"}),
            "create-rt",
            None,
            &analyst(),
        )
        .expect("create package");
    let package_id = created.value.package.id.clone();

    let proposed = toolbox
        .propose_patch(
            &package_id,
            json!({"status": "awarded"}),
            "award decision",
            None,
            &analyst(),
        )
        .expect("propose");
    let approval_id = proposed.approval.id.clone();

    let decided = toolbox
        .decide(&approval_id, Decision::Approved, None, "decide-rt", &admin())
        .expect("decide");
    assert!(!decided.replayed);

    // Shallow merge: top-level key overwritten, sibling preserved.
    let package = toolbox
        .get_package(&package_id, &analyst())
        .expect("get package");
    assert_eq!(package.data, json!({"status": "awarded", "owner": "X"}));

    // The whole flow appends exactly three events beyond creation:
    // approval_created, package_patched, approval_decided.
    let package_events = toolbox
        .timeline(EntityKind::Package, &package_id, 10, None, &analyst())
        .expect("package timeline");
    let approval_events = toolbox
        .timeline(EntityKind::Approval, &approval_id, 10, None, &analyst())
        .expect("approval timeline");
    let mut flow: Vec<&str> = package_events
        .iter()
        .chain(approval_events.iter())
        .map(|event| event.event_type.as_str())
        .filter(|event_type| *event_type != "package_created")
        .collect();
    flow.sort_unstable();
    assert_eq!(
        flow,
        vec!["approval_created", "approval_decided", "package_patched"]
    );

    // A fresh key against the decided approval is a conflict, not a replay.
    let err = toolbox
        .decide(
            &approval_id,
            Decision::Rejected,
            None,
            "decide-rt-again",
            &admin(),
        )
        .expect_err("expected conflict");
    assert!(matches!(err, ToolError::InvalidState { .. }));

    // The original key replays the recorded outcome unchanged.
    let replayed = toolbox
        .decide(&approval_id, Decision::Approved, None, "decide-rt", &admin())
        .expect("replay");
    assert!(replayed.replayed);
    assert_eq!(replayed.value, decided.value);
}
