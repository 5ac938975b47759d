//! Rollback of a saved live run
//!
//! Inverts every applied change of an [`ExecutionReport`]. Skipped and failed
//! actions never reached the zone and are left out. The inverse plan goes
//! through the same zone guard and executor as any other plan.

use tracing::info;

use crate::engine::{ExecutionMode, ExecutionReport};
use crate::error::{Error, Result};
use crate::plan::{ChangeAction, ChangePlan};

/// Build the plan that undoes `report`
pub fn plan_from_report(report: &ExecutionReport) -> Result<ChangePlan> {
    if report.mode != ExecutionMode::Live {
        return Err(Error::input(format!(
            "cannot roll back a {} report: nothing was applied",
            report.mode
        )));
    }

    let actions: Vec<ChangeAction> = report.applied().filter_map(invert).collect();
    info!(
        "Rollback of run started {} on zone {}: {} change(s) to undo",
        report.started_at,
        report.zone,
        actions.len()
    );

    Ok(ChangePlan::from_actions(actions))
}

fn invert(action: &ChangeAction) -> Option<ChangeAction> {
    match action {
        ChangeAction::Create { record } => Some(ChangeAction::Delete {
            record: record.clone(),
        }),
        ChangeAction::Delete { record } => Some(ChangeAction::Create {
            record: record.clone(),
        }),
        ChangeAction::Update { record, previous } => Some(ChangeAction::Update {
            record: previous.clone(),
            previous: record.clone(),
        }),
        ChangeAction::NoOp { .. } => None,
    }
}
