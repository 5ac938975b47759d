//! Contract Test: Idempotency
//!
//! Re-running against a converged zone must not touch it.
//!
//! Constraints verified:
//! - after a live run, planning again with the same input is all no-op
//! - a converged run makes no backend call beyond the initial enumeration
//! - no-ops do not trigger read-back lookups
//!
//! If this test fails, every scheduled run churns the zone.

mod common;

use common::*;
use zonesync_core::{ActionKind, ExecutionMode, Outcome};

#[tokio::test]
async fn second_run_plans_only_noops() {
    let backend = seeded(&[("b.zone.com", "10.0.0.9"), ("c.zone.com", "10.0.0.3")]).await;
    let (reconciler, _events) = reconciler(backend.clone());
    let zone = zone("zone.com");
    let wanted = desired(&[("a.zone.com", "10.0.0.1"), ("b.zone.com", "10.0.0.2")]);

    let first = reconciler
        .reconcile(&zone, &wanted, ExecutionMode::Live)
        .await
        .expect("first run succeeds");
    assert_eq!(first.summary.applied, 3);
    assert!(!first.has_failures());

    assert_eq!(
        contents(&backend).await,
        pairs(&[("a.zone.com", "10.0.0.1"), ("b.zone.com", "10.0.0.2")])
    );

    let replan = reconciler.plan(&zone, &wanted).await.expect("replan succeeds");
    assert!(replan.plan().is_converged());
    assert!(replan.actions().iter().all(|a| a.kind() == ActionKind::NoOp));
    assert_eq!(replan.actions().len(), 2);
}

#[tokio::test]
async fn converged_zone_costs_one_enumeration() {
    let state = [("a.zone.com", "10.0.0.1"), ("b.zone.com", "10.0.0.2")];
    let backend = seeded(&state).await;
    let (reconciler, _events) = reconciler(backend.clone());

    let report = reconciler
        .reconcile(&zone("zone.com"), &desired(&state), ExecutionMode::Live)
        .await
        .expect("run succeeds");

    assert_eq!(report.actions.len(), 2);
    assert!(report
        .actions
        .iter()
        .all(|r| r.outcome == Outcome::Skipped("no change".to_string())));

    let calls = backend.calls();
    assert_eq!(calls.list, 1, "exactly one enumeration");
    assert_eq!(calls.mutations(), 0, "no mutations");
    assert_eq!(calls.lookup, 0, "no read-back for no-ops");
}

#[tokio::test]
async fn repeated_runs_keep_the_zone_stable() {
    let backend = seeded(&[("old.zone.com", "10.0.0.50")]).await;
    let (reconciler, _events) = reconciler(backend.clone());
    let zone = zone("zone.com");
    let wanted = desired(&[("a.zone.com", "10.0.0.1"), ("b.zone.com", "10.0.0.2")]);

    for run in 0..3 {
        let report = reconciler
            .reconcile(&zone, &wanted, ExecutionMode::Live)
            .await
            .expect("run succeeds");
        if run > 0 {
            assert_eq!(report.summary.applied, 0, "run {} changed the zone", run);
        }
    }

    assert_eq!(backend.calls().mutations(), 3);
    assert_eq!(
        contents(&backend).await,
        pairs(&[("a.zone.com", "10.0.0.1"), ("b.zone.com", "10.0.0.2")])
    );
}
