//! Contract Test: Rollback
//!
//! A saved live report must be enough to restore the zone.
//!
//! Constraints verified:
//! - save → load → rollback → apply returns the zone to its prior contents
//! - only applied changes are inverted
//! - dry-run reports cannot be rolled back

mod common;

use common::*;
use tempfile::tempdir;
use tokio_test::assert_ok;
use zonesync_core::report::{load_report, save_report};
use zonesync_core::{Error, ExecutionMode};

const BEFORE: [(&str, &str); 3] = [
    ("b.zone.com", "10.0.0.9"),
    ("c.zone.com", "10.0.0.3"),
    ("keep.zone.com", "10.0.0.7"),
];

#[tokio::test]
async fn rollback_restores_previous_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.json");

    let backend = seeded(&BEFORE).await;
    let (reconciler, _events) = reconciler(backend.clone());
    let zone = zone("zone.com");
    let wanted = desired(&[
        ("a.zone.com", "10.0.0.1"),
        ("b.zone.com", "10.0.0.2"),
        ("keep.zone.com", "10.0.0.7"),
    ]);

    let report = reconciler
        .reconcile(&zone, &wanted, ExecutionMode::Live)
        .await
        .expect("live run succeeds");
    assert_eq!(report.summary.applied, 3);
    save_report(&path, &report).await.expect("report saved");

    let loaded = assert_ok!(load_report(&path).await);
    let undo = assert_ok!(reconciler.plan_rollback(&loaded));
    assert_eq!(undo.plan().summary().total_changes(), 3);

    let undone = reconciler.apply(&undo, ExecutionMode::Live).await;
    assert!(!undone.has_failures());
    assert_eq!(contents(&backend).await, pairs(&BEFORE));
}

#[tokio::test]
async fn failed_actions_are_not_inverted() {
    let backend = seeded(&BEFORE).await;
    backend.fail_on(fqdn("a.zone.com")).await;
    let (reconciler, _events) = reconciler(backend.clone());
    let zone = zone("zone.com");

    let report = reconciler
        .reconcile(
            &zone,
            &desired(&[("a.zone.com", "10.0.0.1"), ("keep.zone.com", "10.0.0.7")]),
            ExecutionMode::Live,
        )
        .await
        .expect("run completes");
    assert_eq!(report.summary.failed, 1);

    let undo = assert_ok!(reconciler.plan_rollback(&report));
    let names: Vec<String> = undo
        .actions()
        .iter()
        .map(|a| a.fqdn().to_string())
        .collect();
    assert_eq!(names, vec!["b.zone.com", "c.zone.com"]);
}

#[tokio::test]
async fn dry_run_report_cannot_be_rolled_back() {
    let backend = seeded(&BEFORE).await;
    let (reconciler, _events) = reconciler(backend.clone());

    let report = reconciler
        .reconcile(
            &zone("zone.com"),
            &desired(&[("a.zone.com", "10.0.0.1")]),
            ExecutionMode::DryRun,
        )
        .await
        .expect("dry run succeeds");

    assert!(matches!(
        reconciler.plan_rollback(&report),
        Err(Error::Input(_))
    ));
}
