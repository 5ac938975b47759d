//! Plan executor
//!
//! Drives a [`SafePlan`] through a backend and records one [`Outcome`] per
//! action, in plan order.
//!
//! ## Phases
//!
//! Deletes, updates, creates and no-ops run as four sequential phases. Inside
//! a phase up to `concurrency` actions are in flight; results are collected in
//! submission order, so the report order never depends on timing.
//!
//! ## Failure isolation
//!
//! An action that fails (backend error, timeout, failed read-back) is recorded
//! as [`Outcome::Failed`] and the executor moves on. Nothing is retried and
//! nothing is undone; see [`crate::rollback`] for the explicit inverse.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::{Fqdn, Record, Zone};
use crate::plan::{ActionKind, ChangeAction, SafePlan};
use crate::traits::DnsBackend;

/// Skip reason recorded for every action of a dry run
pub const SKIP_DRY_RUN: &str = "dry-run";

/// Skip reason recorded for a no-op in a live run
pub const SKIP_NO_CHANGE: &str = "no change";

/// Whether the executor may mutate the zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Report what would happen; never call a mutating backend method
    DryRun,
    /// Apply the plan
    Live,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::DryRun => f.write_str("dry-run"),
            ExecutionMode::Live => f.write_str("live"),
        }
    }
}

/// Terminal state of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// The backend accepted the change (and read-back matched, if enabled)
    Applied,
    /// Not attempted
    Skipped(String),
    /// Attempted and failed
    Failed(String),
}

impl Outcome {
    /// Whether the change reached the zone
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    /// Whether the change failed
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied => f.write_str("applied"),
            Outcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// One action and what became of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    /// The planned change
    pub change: ChangeAction,
    /// Its outcome
    pub outcome: Outcome,
}

/// Counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Applied actions
    pub applied: usize,
    /// Skipped actions
    pub skipped: usize,
    /// Failed actions
    pub failed: usize,
}

impl ExecutionSummary {
    fn tally(reports: &[ActionReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome {
                Outcome::Applied => summary.applied += 1,
                Outcome::Skipped(_) => summary.skipped += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Number of actions accounted for
    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.failed
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} skipped, {} failed",
            self.applied, self.skipped, self.failed
        )
    }
}

/// Result of executing one plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Zone the plan was guarded against
    pub zone: Zone,
    /// Dry run or live
    pub mode: ExecutionMode,
    /// Backend that executed the plan
    pub backend: String,
    /// When execution started
    pub started_at: DateTime<Utc>,
    /// When execution finished
    pub finished_at: DateTime<Utc>,
    /// One entry per planned action, in plan order
    pub actions: Vec<ActionReport>,
    /// Counts by outcome
    pub summary: ExecutionSummary,
}

impl ExecutionReport {
    /// Whether any action failed
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Changes that reached the zone, in plan order
    pub fn applied(&self) -> impl Iterator<Item = &ChangeAction> {
        self.actions
            .iter()
            .filter(|r| r.outcome.is_applied())
            .map(|r| &r.change)
    }

    /// Failed actions, in plan order
    pub fn failures(&self) -> impl Iterator<Item = &ActionReport> {
        self.actions.iter().filter(|r| r.outcome.is_failed())
    }
}

/// Executor tuning
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Actions in flight per phase
    pub concurrency: usize,
    /// Deadline for each backend call
    pub action_timeout: Duration,
    /// Read back every mutation
    pub verify_after_apply: bool,
    /// TTL for records that carry none
    pub default_ttl: u32,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ExecutorOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            action_timeout: config.action_timeout(),
            verify_after_apply: config.verify_after_apply,
            default_ttl: config.default_ttl,
        }
    }
}

/// Applies guarded plans through a backend
pub struct PlanExecutor {
    backend: Arc<dyn DnsBackend>,
    options: ExecutorOptions,
}

impl PlanExecutor {
    /// Create an executor
    pub fn new(backend: Arc<dyn DnsBackend>, options: ExecutorOptions) -> Self {
        Self { backend, options }
    }

    /// Execute `plan` in `mode`
    pub async fn execute(&self, plan: &SafePlan, mode: ExecutionMode) -> ExecutionReport {
        self.execute_with(plan, mode, |_| {}).await
    }

    /// Execute `plan`, calling `on_finished` as each action reaches its
    /// terminal state
    pub async fn execute_with<F>(
        &self,
        plan: &SafePlan,
        mode: ExecutionMode,
        mut on_finished: F,
    ) -> ExecutionReport
    where
        F: FnMut(&ActionReport),
    {
        let started_at = Utc::now();
        let zone = plan.zone();
        let width = self.options.concurrency.max(1);
        let mut reports = Vec::with_capacity(plan.actions().len());

        info!(
            "Executing {} actions against zone {} ({} mode, backend {})",
            plan.actions().len(),
            zone,
            mode,
            self.backend.backend_name()
        );

        for kind in ActionKind::PHASES {
            let batch: Vec<&ChangeAction> = plan.plan().of_kind(kind).collect();
            if batch.is_empty() {
                continue;
            }
            debug!("Phase {}: {} action(s)", kind.label(), batch.len());

            let mut results = stream::iter(batch)
                .map(|action| self.run(zone, action, mode))
                .buffered(width);

            while let Some(report) = results.next().await {
                on_finished(&report);
                reports.push(report);
            }
        }

        let summary = ExecutionSummary::tally(&reports);
        info!("Execution finished: {}", summary);

        ExecutionReport {
            zone: zone.clone(),
            mode,
            backend: self.backend.backend_name().to_string(),
            started_at,
            finished_at: Utc::now(),
            actions: reports,
            summary,
        }
    }

    async fn run(&self, zone: &Zone, action: &ChangeAction, mode: ExecutionMode) -> ActionReport {
        let outcome = match (mode, action) {
            (ExecutionMode::DryRun, _) => Outcome::Skipped(SKIP_DRY_RUN.to_string()),
            (ExecutionMode::Live, ChangeAction::NoOp { .. }) => {
                Outcome::Skipped(SKIP_NO_CHANGE.to_string())
            }
            (ExecutionMode::Live, _) => match self.apply(zone, action).await {
                Ok(()) => {
                    info!("Applied: {}", action);
                    Outcome::Applied
                }
                Err(e) => {
                    error!("Failed: {}: {}", action, e);
                    Outcome::Failed(e.to_string())
                }
            },
        };

        ActionReport {
            change: action.clone(),
            outcome,
        }
    }

    async fn apply(&self, zone: &Zone, action: &ChangeAction) -> Result<()> {
        let backend = self.backend.as_ref();
        match action {
            ChangeAction::Create { record } => {
                let record = self.resolve_ttl(record);
                self.bounded("create", &record.fqdn, backend.create(zone, &record))
                    .await?;
                self.verify_present(zone, &record).await
            }
            ChangeAction::Update { record, previous } => {
                let record = self.resolve_ttl(record);
                self.bounded(
                    "update",
                    &record.fqdn,
                    backend.update(zone, &record, previous),
                )
                .await?;
                self.verify_present(zone, &record).await
            }
            ChangeAction::Delete { record } => {
                self.bounded("delete", &record.fqdn, backend.delete(zone, record))
                    .await?;
                self.verify_absent(zone, record).await
            }
            ChangeAction::NoOp { .. } => Ok(()),
        }
    }

    fn resolve_ttl(&self, record: &Record) -> Record {
        let ttl = record.effective_ttl(self.options.default_ttl);
        record.clone().with_ttl(ttl)
    }

    async fn bounded<T>(
        &self,
        call: &str,
        fqdn: &Fqdn,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.options.action_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "{} {} exceeded {}s",
                call,
                fqdn,
                self.options.action_timeout.as_secs_f64()
            ))),
        }
    }

    async fn verify_present(&self, zone: &Zone, record: &Record) -> Result<()> {
        if !self.options.verify_after_apply {
            return Ok(());
        }

        let found = self
            .bounded("lookup", &record.fqdn, self.backend.lookup(zone, &record.fqdn))
            .await?;
        match found {
            Some(found) if found.ip == record.ip => Ok(()),
            Some(found) => Err(Error::conflict(format!(
                "verification failed: {} resolves to {}, expected {}",
                record.fqdn, found.ip, record.ip
            ))),
            None => Err(Error::not_found(format!(
                "verification failed: {} missing after apply",
                record.fqdn
            ))),
        }
    }

    async fn verify_absent(&self, zone: &Zone, record: &Record) -> Result<()> {
        if !self.options.verify_after_apply {
            return Ok(());
        }

        let found = self
            .bounded("lookup", &record.fqdn, self.backend.lookup(zone, &record.fqdn))
            .await?;
        match found {
            Some(found) if found.ip == record.ip => Err(Error::conflict(format!(
                "verification failed: {} still resolves to {}",
                record.fqdn, found.ip
            ))),
            _ => Ok(()),
        }
    }
}
