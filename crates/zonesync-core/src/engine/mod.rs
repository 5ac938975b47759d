//! Reconciliation engine
//!
//! The [`Reconciler`] runs one convergence pass for one zone:
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ fetch (list) │──▶│    diff    │──▶│  zone guard  │──▶│   executor   │
//! └──────────────┘   └────────────┘   └──────────────┘   └──────────────┘
//!        ▲                 ▲                                     │
//!        │           DesiredState                                ▼
//!   DnsBackend ◀─────────────────────────────────────── create/update/delete
//! ```
//!
//! Fetch failures, zone violations and configuration problems are returned as
//! errors before anything is mutated. Per-action failures during execution are
//! recorded in the [`ExecutionReport`] instead.
//!
//! ## Events
//!
//! Progress is published as [`EngineEvent`]s on a bounded channel. When the
//! channel is full, events are dropped with a warning; when the receiver is
//! gone, they are discarded.

pub mod executor;

pub use executor::{
    ActionReport, ExecutionMode, ExecutionReport, ExecutionSummary, ExecutorOptions, Outcome,
    PlanExecutor,
};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::fetch::fetch_current_state;
use crate::model::{CurrentState, DesiredState, Fqdn, Zone};
use crate::plan::{ActionKind, PlanSummary, SafePlan, diff_with_policy, enforce};
use crate::rollback;
use crate::traits::DnsBackend;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Planning started for a zone
    RunStarted {
        zone: Zone,
        desired_records: usize,
    },

    /// Current state enumerated
    FetchCompleted {
        zone: Zone,
        current_records: usize,
    },

    /// A plan passed the zone guard
    PlanComputed {
        zone: Zone,
        summary: PlanSummary,
    },

    /// The zone guard rejected a plan
    PlanRejected {
        fqdn: String,
        zone: String,
    },

    /// One action reached its terminal state
    ActionFinished {
        fqdn: Fqdn,
        kind: ActionKind,
        outcome: Outcome,
    },

    /// Execution finished
    RunFinished {
        zone: Zone,
        mode: ExecutionMode,
        summary: ExecutionSummary,
    },
}

/// Reconciles one zone against a desired state through one backend
pub struct Reconciler {
    /// Backend session
    backend: Arc<dyn DnsBackend>,

    /// Engine settings
    engine: EngineConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Reconciler {
    /// Create a reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// engine events
    pub fn new(
        backend: Arc<dyn DnsBackend>,
        engine: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        engine.validate()?;

        let (tx, rx) = mpsc::channel(engine.event_channel_capacity);

        let reconciler = Self {
            backend,
            engine,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Enumerate the zone's current state
    pub async fn fetch(&self, zone: &Zone) -> Result<CurrentState> {
        let current =
            fetch_current_state(self.backend.as_ref(), zone, self.engine.fetch_timeout()).await?;
        self.emit_event(EngineEvent::FetchCompleted {
            zone: zone.clone(),
            current_records: current.len(),
        });
        Ok(current)
    }

    /// Fetch, diff and guard
    ///
    /// Fails before any mutation if the zone cannot be enumerated or if the
    /// plan touches a name outside `zone`.
    pub async fn plan(&self, zone: &Zone, desired: &DesiredState) -> Result<SafePlan> {
        info!(
            "Planning zone {} ({} desired records, backend {})",
            zone,
            desired.len(),
            self.backend_name()
        );
        self.emit_event(EngineEvent::RunStarted {
            zone: zone.clone(),
            desired_records: desired.len(),
        });

        let current = self.fetch(zone).await?;
        let plan = diff_with_policy(desired, &current, self.engine.diff_policy());
        let safe = self.guard(zone, plan)?;

        let summary = safe.plan().summary();
        info!(
            "Plan for {}: {} create, {} update, {} delete, {} unchanged",
            zone, summary.creates, summary.updates, summary.deletes, summary.unchanged
        );
        self.emit_event(EngineEvent::PlanComputed {
            zone: zone.clone(),
            summary,
        });

        Ok(safe)
    }

    /// Execute a guarded plan
    pub async fn apply(&self, plan: &SafePlan, mode: ExecutionMode) -> ExecutionReport {
        let executor = PlanExecutor::new(self.backend.clone(), ExecutorOptions::from(&self.engine));

        let report = executor
            .execute_with(plan, mode, |finished| {
                self.emit_event(EngineEvent::ActionFinished {
                    fqdn: finished.change.fqdn().clone(),
                    kind: finished.change.kind(),
                    outcome: finished.outcome.clone(),
                });
            })
            .await;

        self.emit_event(EngineEvent::RunFinished {
            zone: report.zone.clone(),
            mode,
            summary: report.summary,
        });
        report
    }

    /// Plan and execute in one call
    pub async fn reconcile(
        &self,
        zone: &Zone,
        desired: &DesiredState,
        mode: ExecutionMode,
    ) -> Result<ExecutionReport> {
        let plan = self.plan(zone, desired).await?;
        Ok(self.apply(&plan, mode).await)
    }

    /// Build the guarded inverse of a saved live report
    pub fn plan_rollback(&self, report: &ExecutionReport) -> Result<SafePlan> {
        let plan = rollback::plan_from_report(report)?;
        let safe = self.guard(&report.zone, plan)?;
        self.emit_event(EngineEvent::PlanComputed {
            zone: report.zone.clone(),
            summary: safe.plan().summary(),
        });
        Ok(safe)
    }

    fn guard(&self, zone: &Zone, plan: crate::plan::ChangePlan) -> Result<SafePlan> {
        enforce(zone, plan).inspect_err(|e| {
            if let Error::ZoneViolation { fqdn, zone } = e {
                self.emit_event(EngineEvent::PlanRejected {
                    fqdn: fqdn.clone(),
                    zone: zone.clone(),
                });
            }
        })
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
