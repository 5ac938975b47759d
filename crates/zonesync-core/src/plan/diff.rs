//! Diff engine
//!
//! Compares desired and current state and emits exactly one action per name in
//! the union of both key sets. The function is pure: the same inputs always
//! give the same plan, which is what lets a dry run predict a live run.

use std::collections::BTreeSet;
use tracing::debug;

use super::{ChangeAction, ChangePlan};
use crate::model::{CurrentState, DesiredState, Record};

/// Which record fields decide whether an existing record needs an update
///
/// Name and address are always compared. TTL is compared only when
/// `compare_ttl` is set and the desired record carries an explicit TTL, since
/// CSV input has no TTL column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffPolicy {
    /// Treat a TTL mismatch as a change
    pub compare_ttl: bool,
}

impl DiffPolicy {
    /// Whether `current` already satisfies `desired`
    pub fn is_satisfied(&self, desired: &Record, current: &Record) -> bool {
        if desired.ip != current.ip {
            return false;
        }
        match (self.compare_ttl, desired.ttl) {
            (true, Some(ttl)) => current.ttl == Some(ttl),
            _ => true,
        }
    }
}

/// Compute the change plan under the default policy
pub fn diff(desired: &DesiredState, current: &CurrentState) -> ChangePlan {
    diff_with_policy(desired, current, DiffPolicy::default())
}

/// Compute the change plan under an explicit policy
pub fn diff_with_policy(
    desired: &DesiredState,
    current: &CurrentState,
    policy: DiffPolicy,
) -> ChangePlan {
    let names: BTreeSet<_> = desired.names().chain(current.names()).collect();
    let mut actions = Vec::with_capacity(names.len());

    for name in names {
        let action = match (desired.get(name), current.get(name)) {
            (Some(want), Some(have))
                if policy.is_satisfied(want, have) && !current.is_multi_address(name) =>
            {
                ChangeAction::NoOp {
                    record: have.clone(),
                }
            }
            (Some(want), Some(have)) => ChangeAction::Update {
                record: want.clone(),
                previous: have.clone(),
            },
            (Some(want), None) => ChangeAction::Create {
                record: want.clone(),
            },
            (None, Some(have)) => ChangeAction::Delete {
                record: have.clone(),
            },
            (None, None) => continue,
        };
        debug!("Planned: {}", action);
        actions.push(action);
    }

    ChangePlan::from_actions(actions)
}
