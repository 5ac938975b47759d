//! Contract Test: Dry-Run Equivalence
//!
//! A dry run must predict the live run exactly.
//!
//! Constraints verified:
//! - dry-run and live reports have the same actions in the same order
//! - a dry run issues no mutating backend call
//! - every dry-run action is skipped with reason "dry-run"
//!
//! If this test fails, operators review a plan that is not the one applied.

mod common;

use common::*;
use zonesync_core::engine::executor::SKIP_DRY_RUN;
use zonesync_core::{ExecutionMode, Outcome};

const CURRENT: [(&str, &str); 4] = [
    ("b.zone.com", "10.0.0.9"),
    ("c.zone.com", "10.0.0.3"),
    ("d.zone.com", "10.0.0.4"),
    ("e.zone.com", "10.0.0.5"),
];

const DESIRED: [(&str, &str); 4] = [
    ("a.zone.com", "10.0.0.1"),
    ("b.zone.com", "10.0.0.2"),
    ("d.zone.com", "10.0.0.4"),
    ("f.zone.com", "10.0.0.6"),
];

#[tokio::test]
async fn dry_run_and_live_reports_line_up() {
    let zone = zone("zone.com");
    let wanted = desired(&DESIRED);

    let dry_backend = seeded(&CURRENT).await;
    let (dry, _events) = reconciler(dry_backend.clone());
    let dry_report = dry
        .reconcile(&zone, &wanted, ExecutionMode::DryRun)
        .await
        .expect("dry run succeeds");

    let live_backend = seeded(&CURRENT).await;
    let (live, _events) = reconciler(live_backend.clone());
    let live_report = live
        .reconcile(&zone, &wanted, ExecutionMode::Live)
        .await
        .expect("live run succeeds");

    assert_eq!(dry_report.actions.len(), live_report.actions.len());
    let dry_changes: Vec<_> = dry_report.actions.iter().map(|r| &r.change).collect();
    let live_changes: Vec<_> = live_report.actions.iter().map(|r| &r.change).collect();
    assert_eq!(dry_changes, live_changes);

    assert_eq!(dry_report.mode, ExecutionMode::DryRun);
    assert_eq!(dry_report.summary.skipped, dry_report.actions.len());
    assert!(dry_report
        .actions
        .iter()
        .all(|r| r.outcome == Outcome::Skipped(SKIP_DRY_RUN.to_string())));

    assert_eq!(dry_backend.calls().mutations(), 0);
    assert_eq!(contents(&dry_backend).await, pairs(&CURRENT));
    assert_eq!(live_report.summary.applied, 5);
}

#[tokio::test]
async fn dry_run_completes_even_if_writes_would_fail() {
    let backend = seeded(&CURRENT).await;
    backend.fail_on(fqdn("a.zone.com")).await;
    let (reconciler, _events) = reconciler(backend.clone());

    let report = reconciler
        .reconcile(&zone("zone.com"), &desired(&DESIRED), ExecutionMode::DryRun)
        .await
        .expect("dry run succeeds");

    assert!(!report.has_failures());
}
