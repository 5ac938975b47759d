//! Change plans
//!
//! A [`ChangePlan`] is the ordered list of [`ChangeAction`]s that converges a
//! zone's current state to the desired state. Plans are produced by
//! [`diff`](diff::diff), checked by [`enforce`](guard::enforce) and consumed by
//! the executor.
//!
//! ## Ordering
//!
//! Actions are grouped into phases: deletes, then updates, then creates, then
//! no-ops. Within a phase actions are in name order. The delete phase never
//! grows the zone, so a name freed in this run is gone before anything new is
//! created.

pub mod diff;
pub mod guard;

pub use diff::{DiffPolicy, diff, diff_with_policy};
pub use guard::{SafePlan, enforce};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Fqdn, Record};

/// Kind of a change action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Remove a record that is no longer declared
    Delete,
    /// Point an existing name at a new address
    Update,
    /// Add a newly declared record
    Create,
    /// Name already converged
    NoOp,
}

impl ActionKind {
    /// Phases in execution order
    pub const PHASES: [ActionKind; 4] = [
        ActionKind::Delete,
        ActionKind::Update,
        ActionKind::Create,
        ActionKind::NoOp,
    ];

    /// Lower-case label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Delete => "delete",
            ActionKind::Update => "update",
            ActionKind::Create => "create",
            ActionKind::NoOp => "no change",
        }
    }
}

/// One change for one name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChangeAction {
    /// Create `record`
    Create {
        /// Record to add
        record: Record,
    },
    /// Replace `previous` with `record`
    Update {
        /// Desired record
        record: Record,
        /// Record currently in the zone
        previous: Record,
    },
    /// Remove `record`
    Delete {
        /// Record to remove
        record: Record,
    },
    /// Nothing to do for `record`
    NoOp {
        /// Record already in place
        record: Record,
    },
}

impl ChangeAction {
    /// Kind of this action
    pub fn kind(&self) -> ActionKind {
        match self {
            ChangeAction::Create { .. } => ActionKind::Create,
            ChangeAction::Update { .. } => ActionKind::Update,
            ChangeAction::Delete { .. } => ActionKind::Delete,
            ChangeAction::NoOp { .. } => ActionKind::NoOp,
        }
    }

    /// The record this action targets
    ///
    /// For deletes this is the record being removed.
    pub fn record(&self) -> &Record {
        match self {
            ChangeAction::Create { record }
            | ChangeAction::Update { record, .. }
            | ChangeAction::Delete { record }
            | ChangeAction::NoOp { record } => record,
        }
    }

    /// The name this action targets
    pub fn fqdn(&self) -> &Fqdn {
        &self.record().fqdn
    }

    /// Every name referenced by the action
    pub fn names(&self) -> impl Iterator<Item = &Fqdn> {
        let previous = match self {
            ChangeAction::Update { previous, .. } => Some(&previous.fqdn),
            _ => None,
        };
        std::iter::once(self.fqdn()).chain(previous)
    }

    /// Whether executing this action mutates the zone
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ChangeAction::NoOp { .. })
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Create { record } => write!(f, "+ {} -> {}", record.fqdn, record.ip),
            ChangeAction::Update { record, previous } => {
                write!(f, "~ {} -> {} (was {})", record.fqdn, record.ip, previous.ip)
            }
            ChangeAction::Delete { record } => write!(f, "- {} ({})", record.fqdn, record.ip),
            ChangeAction::NoOp { record } => write!(f, "= {} -> {}", record.fqdn, record.ip),
        }
    }
}

/// Counts of actions by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Records to create
    pub creates: usize,
    /// Records to update
    pub updates: usize,
    /// Records to delete
    pub deletes: usize,
    /// Records already converged
    pub unchanged: usize,
}

impl PlanSummary {
    /// Number of mutating actions
    pub fn total_changes(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

/// An ordered list of change actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePlan {
    actions: Vec<ChangeAction>,
}

impl ChangePlan {
    /// Arrange actions into phase order
    ///
    /// The sort is stable, so callers control the order inside a phase.
    pub(crate) fn from_actions(mut actions: Vec<ChangeAction>) -> Self {
        actions.sort_by_key(ChangeAction::kind);
        Self { actions }
    }

    /// Actions in execution order
    pub fn actions(&self) -> &[ChangeAction] {
        &self.actions
    }

    /// Iterate actions in execution order
    pub fn iter(&self) -> std::slice::Iter<'_, ChangeAction> {
        self.actions.iter()
    }

    /// Actions of one kind, in order
    pub fn of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &ChangeAction> {
        self.actions.iter().filter(move |a| a.kind() == kind)
    }

    /// Number of actions, no-ops included
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan has no actions at all
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Counts by kind
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            match action.kind() {
                ActionKind::Create => summary.creates += 1,
                ActionKind::Update => summary.updates += 1,
                ActionKind::Delete => summary.deletes += 1,
                ActionKind::NoOp => summary.unchanged += 1,
            }
        }
        summary
    }

    /// Whether executing the plan would change nothing
    pub fn is_converged(&self) -> bool {
        self.actions.iter().all(|a| !a.is_mutation())
    }
}

impl<'a> IntoIterator for &'a ChangePlan {
    type Item = &'a ChangeAction;
    type IntoIter = std::slice::Iter<'a, ChangeAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}
