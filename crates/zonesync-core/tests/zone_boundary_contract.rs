//! Contract Test: Zone Boundary
//!
//! No run may mutate a name outside its zone.
//!
//! Constraints verified:
//! - a desired record outside the zone rejects the whole plan
//! - a rejected plan causes zero backend mutations
//! - the rejection names the offending FQDN and the zone
//! - foreign names returned by the backend are never planned for deletion
//!
//! If this test fails, a CSV typo can rewrite someone else's zone.

mod common;

use common::*;
use zonesync_core::{EngineEvent, Error, ErrorClass, ExecutionMode};

#[tokio::test]
async fn out_of_zone_record_rejects_whole_plan() {
    let backend = seeded(&[("b.zone.com", "10.0.0.9")]).await;
    let (reconciler, mut events) = reconciler(backend.clone());
    let wanted = desired(&[
        ("a.zone.com", "10.0.0.1"),
        ("evil.other-zone.com", "10.0.0.66"),
    ]);

    let result = reconciler
        .reconcile(&zone("zone.com"), &wanted, ExecutionMode::Live)
        .await;

    let err = match result {
        Err(err) => err,
        Ok(report) => panic!("expected zone violation, got {}", report.summary),
    };
    assert_eq!(err.class(), ErrorClass::ZoneViolation);
    match err {
        Error::ZoneViolation { fqdn, zone } => {
            assert_eq!(fqdn, "evil.other-zone.com");
            assert_eq!(zone, "zone.com");
        }
        other => panic!("expected zone violation, got {}", other),
    }

    assert_eq!(backend.calls().mutations(), 0, "no mutation after rejection");
    assert_eq!(contents(&backend).await, pairs(&[("b.zone.com", "10.0.0.9")]));

    drop(reconciler);
    let mut rejected = false;
    while let Some(event) = events.recv().await {
        if let EngineEvent::PlanRejected { fqdn, .. } = event {
            assert_eq!(fqdn, "evil.other-zone.com");
            rejected = true;
        }
    }
    assert!(rejected, "PlanRejected event emitted");
}

#[tokio::test]
async fn lookalike_suffix_is_outside_the_zone() {
    let backend = seeded(&[]).await;
    let (reconciler, _events) = reconciler(backend.clone());

    let result = reconciler
        .plan(
            &zone("example.com"),
            &desired(&[("fooexample.com", "10.0.0.1")]),
        )
        .await;

    assert!(matches!(result, Err(Error::ZoneViolation { .. })));
}

#[tokio::test]
async fn foreign_backend_records_are_left_alone() {
    let backend = seeded(&[
        ("a.zone.com", "10.0.0.1"),
        ("www.elsewhere.org", "10.9.9.9"),
    ])
    .await;
    let (reconciler, _events) = reconciler(backend.clone());

    let report = reconciler
        .reconcile(
            &zone("zone.com"),
            &desired(&[("a.zone.com", "10.0.0.1")]),
            ExecutionMode::Live,
        )
        .await
        .expect("run succeeds");

    assert_eq!(report.actions.len(), 1, "foreign name never planned");
    assert_eq!(backend.calls().delete, 0);
    assert!(backend.get(&fqdn("www.elsewhere.org")).await.is_some());
}

#[tokio::test]
async fn apex_and_deep_names_are_inside() {
    let backend = seeded(&[]).await;
    let (reconciler, _events) = reconciler(backend.clone());

    let report = reconciler
        .reconcile(
            &zone("Zone.COM."),
            &desired(&[("zone.com", "10.0.0.1"), ("a.b.c.zone.com", "10.0.0.2")]),
            ExecutionMode::Live,
        )
        .await
        .expect("run succeeds");

    assert_eq!(report.summary.applied, 2);
}
