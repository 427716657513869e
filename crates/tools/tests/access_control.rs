#![forbid(unsafe_code)]

use pf_core::auth::UserContext;
use pf_core::model::{Decision, Role};
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

fn viewer() -> UserContext {
    UserContext::new("u_viewer", "Viewer", [Role::Viewer])
}

fn seed_package(toolbox: &mut Toolbox, code: &str) -> String {
    let outcome = toolbox
        .create_package(
            code,
            &format!("Package {code}"),
            json!({"status": "draft"}),
            &format!("create-{code}"),
            None,
            &analyst(),
        )
        .expect("create package");
    outcome.value.package.id
}

#[test]
fn viewer_reads_but_cannot_write() {
    let storage_dir = temp_dir("viewer_reads_but_cannot_write");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");
    let package_id = seed_package(&mut toolbox, "PKG-V");

    let package = toolbox
        .get_package(&package_id, &viewer())
        .expect("viewer read");
    assert_eq!(package.code, "PKG-V");

    let err = toolbox
        .create_package("PKG-V2", "Denied", json!({}), "create-v2", None, &viewer())
        .expect_err("viewer write should fail");
    assert!(matches!(err, ToolError::Permission(_)));

    let err = toolbox
        .propose_patch(&package_id, json!({"status": "awarded"}), "try", None, &viewer())
        .expect_err("viewer propose should fail");
    assert!(matches!(err, ToolError::Permission(_)));
}

#[test]
fn only_admin_decides() {
    let storage_dir = temp_dir("only_admin_decides");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");
    let package_id = seed_package(&mut toolbox, "PKG-D");

    let proposed = toolbox
        .propose_patch(
            &package_id,
            json!({"status": "awarded"}),
            "award after review",
            None,
            &analyst(),
        )
        .expect("analyst proposes");

    // The analyst who proposed cannot decide, key or no key.
    let err = toolbox
        .decide(
            &proposed.approval.id,
            Decision::Approved,
            None,
            "decide-1",
            &analyst(),
        )
        .expect_err("analyst decide should fail");
    assert!(matches!(err, ToolError::Permission(_)));

    let decided = toolbox
        .decide(
            &proposed.approval.id,
            Decision::Approved,
            Some("approved after review"),
            "decide-1",
            &admin(),
        )
        .expect("admin decides");
    assert!(!decided.replayed);
    assert_eq!(decided.value.approval.status, "approved");
    assert_eq!(decided.value.approval.decided_by.as_deref(), Some("u_admin"));
}

#[test]
fn permission_failure_precedes_validation() {
    let storage_dir = temp_dir("permission_failure_precedes_validation");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");

    // Empty title would be a validation error, but the viewer is rejected
    // before the input is even inspected.
    let err = toolbox
        .create_package("PKG-X", "", json!({}), "create-x", None, &viewer())
        .expect_err("expected permission error");
    assert!(matches!(err, ToolError::Permission(_)));
}

#[test]
fn proposer_identity_is_recorded() {
    let storage_dir = temp_dir("proposer_identity_is_recorded");
    let mut toolbox = Toolbox::open(&storage_dir).expect("open toolbox");
    let package_id = seed_package(&mut toolbox, "PKG-P");

    let proposed = toolbox
        .propose_patch(
            &package_id,
            json!({"owner": "new-team"}),
            "ownership transfer",
            None,
            &analyst(),
        )
        .expect("propose");
    assert_eq!(proposed.approval.requested_by, "u_analyst");
}
