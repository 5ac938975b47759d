//! Contract Test: Diff Partition
//!
//! The diff must plan every name exactly once.
//!
//! Constraints verified:
//! - `diff(D, C)` yields one action per name in `keys(D) ∪ keys(C)`
//! - no name is omitted or duplicated
//! - the action kind follows from presence and address equality
//! - plans are ordered delete → update → create → no-op
//!
//! If this test fails, a run can skip or double-apply a record.

mod common;

use common::*;
use std::collections::HashSet;
use zonesync_core::plan::diff;
use zonesync_core::{ActionKind, ChangeAction, CurrentState, DesiredState, Fqdn, Record};

/// Small deterministic generator so the property runs over many shapes
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn random_states(seed: u64) -> (DesiredState, CurrentState) {
    let mut rng = Lcg(seed);
    let mut desired = Vec::new();
    let mut current = CurrentState::new();

    for i in 0..40 {
        let name = format!("host{}.zone.com", i);
        let roll = rng.next() % 4;
        let ip_a = format!("10.0.{}.{}", i, rng.next() % 3);
        let ip_b = format!("10.0.{}.{}", i, rng.next() % 3);
        match roll {
            0 => desired.push(rec(&name, &ip_a)),
            1 => {
                current.insert(rec(&name, &ip_b));
            }
            2 => {
                desired.push(rec(&name, &ip_a));
                current.insert(rec(&name, &ip_b));
            }
            _ => {}
        }
    }

    (DesiredState::from_records(desired).unwrap(), current)
}

fn expected_kind(desired: Option<&Record>, current: Option<&Record>) -> ActionKind {
    match (desired, current) {
        (Some(d), Some(c)) if d.ip == c.ip => ActionKind::NoOp,
        (Some(_), Some(_)) => ActionKind::Update,
        (Some(_), None) => ActionKind::Create,
        (None, Some(_)) => ActionKind::Delete,
        (None, None) => unreachable!("name came from one of the states"),
    }
}

#[test]
fn every_name_is_planned_exactly_once() {
    for seed in 0..50 {
        let (desired, current) = random_states(seed);
        let plan = diff(&desired, &current);

        let union: HashSet<&Fqdn> = desired.names().chain(current.names()).collect();
        let planned: Vec<&Fqdn> = plan.iter().map(ChangeAction::fqdn).collect();
        let unique: HashSet<&Fqdn> = planned.iter().copied().collect();

        assert_eq!(planned.len(), unique.len(), "seed {}: duplicate name", seed);
        assert_eq!(unique, union, "seed {}: names differ from union", seed);

        for action in plan.iter() {
            let name = action.fqdn();
            assert_eq!(
                action.kind(),
                expected_kind(desired.get(name), current.get(name)),
                "seed {}: wrong action for {}",
                seed,
                name
            );
        }
    }
}

#[test]
fn plans_are_phase_ordered() {
    for seed in 0..50 {
        let (desired, current) = random_states(seed);
        let plan = diff(&desired, &current);

        let kinds: Vec<ActionKind> = plan.iter().map(ChangeAction::kind).collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted, "seed {}: phases interleaved", seed);
    }
}

#[test]
fn mixed_example_plan() {
    let desired = desired(&[("a.zone.com", "10.0.0.1"), ("b.zone.com", "10.0.0.2")]);
    let current = current(&[("b.zone.com", "10.0.0.9"), ("c.zone.com", "10.0.0.3")]);

    let plan = diff(&desired, &current);

    assert_eq!(
        plan.actions(),
        &[
            ChangeAction::Delete {
                record: rec("c.zone.com", "10.0.0.3"),
            },
            ChangeAction::Update {
                record: rec("b.zone.com", "10.0.0.2"),
                previous: rec("b.zone.com", "10.0.0.9"),
            },
            ChangeAction::Create {
                record: rec("a.zone.com", "10.0.0.1"),
            },
        ]
    );
}

#[test]
fn diff_is_deterministic() {
    let (desired, current) = random_states(7);
    assert_eq!(diff(&desired, &current), diff(&desired, &current));
}
