// # Reports
//
// Human-readable and machine-readable renderings of a run.
//
// - `render_plan_table`: counts and names per operation, printed before
//   execution
// - `render_dry_run`: the dry-run summary document written by `--output-file`
// - `render_execution`: per-action outcomes after a live run
// - `save_report` / `load_report`: the JSON report used for rollback
//
// ## Atomic writes
//
// Files are written to a `.tmp` sibling, flushed, then renamed over the
// target, so a crash never leaves a half-written report behind.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::engine::ExecutionReport;
use crate::error::{Error, Result};
use crate::input::RejectedRow;
use crate::plan::{ActionKind, ChangeAction, ChangePlan};

/// Current report file format version
const REPORT_FILE_VERSION: &str = "1";

const RULE_WIDTH: usize = 60;

/// On-disk report format
#[derive(Debug, Serialize, Deserialize)]
struct ReportFile {
    /// Format version
    version: String,
    /// The report
    report: ExecutionReport,
}

/// Table of planned operations
pub fn render_plan_table(plan: &ChangePlan) -> String {
    let rows = [
        ("Create", ActionKind::Create),
        ("Update", ActionKind::Update),
        ("Delete", ActionKind::Delete),
        ("No Change", ActionKind::NoOp),
    ];

    let mut out = String::new();
    let _ = writeln!(out, "DNS Changes Summary");
    let _ = writeln!(out, "{:<10} {:>6}  Details", "Operation", "Count");
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for (label, kind) in rows {
        let names: Vec<&str> = plan.of_kind(kind).map(|a| a.fqdn().as_str()).collect();
        if names.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{:<10} {:>6}  {}", label, names.len(), names.join(", "));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Total changes: {}", plan.summary().total_changes());
    out
}

/// The dry-run summary document
pub fn render_dry_run(plan: &ChangePlan, timestamp: DateTime<Local>) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "ZONESYNC - DRY RUN SUMMARY");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);
    let _ = writeln!(out, "Total Changes: {}", plan.summary().total_changes());
    let _ = writeln!(out, "Timestamp: {}", timestamp.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out);

    let sections = [
        ("RECORDS TO CREATE:", 20, ActionKind::Create),
        ("RECORDS TO UPDATE:", 20, ActionKind::Update),
        ("RECORDS TO DELETE:", 20, ActionKind::Delete),
        ("RECORDS WITH NO CHANGES:", 25, ActionKind::NoOp),
    ];

    for (title, underline, kind) in sections {
        let mut actions = plan.of_kind(kind).peekable();
        if actions.peek().is_none() {
            continue;
        }
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out, "{}", "-".repeat(underline));
        for action in actions {
            let _ = writeln!(out, "  {}", dry_run_line(action));
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "END OF DRY RUN SUMMARY");
    let _ = writeln!(out, "{}", rule);
    out
}

fn dry_run_line(action: &ChangeAction) -> String {
    match action {
        ChangeAction::Create { record } => format!("+ {:<30} -> {}", record.fqdn.as_str(), record.ip),
        ChangeAction::Update { record, previous } => format!(
            "~ {:<30} -> {} (was {})",
            record.fqdn.as_str(),
            record.ip,
            previous.ip
        ),
        ChangeAction::Delete { record } => format!("- {:<30} ({})", record.fqdn.as_str(), record.ip),
        ChangeAction::NoOp { record } => format!("= {}", record.fqdn),
    }
}

/// Per-action outcome listing
pub fn render_execution(report: &ExecutionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Zone {} ({} run via {})",
        report.zone, report.mode, report.backend
    );
    for entry in &report.actions {
        let _ = writeln!(out, "  {:<45} {}", entry.change.to_string(), entry.outcome);
    }
    let _ = writeln!(out, "Summary: {}", report.summary);
    out
}

/// Listing of rejected input rows
pub fn render_rejected(rows: &[RejectedRow]) -> String {
    let mut out = String::new();
    if rows.is_empty() {
        return out;
    }
    let _ = writeln!(out, "Rejected {} input row(s):", rows.len());
    for row in rows {
        let _ = writeln!(out, "  line {:>4}: {} [{}]", row.line, row.reason, row.raw);
    }
    out
}

/// Write the dry-run document to `path`
pub async fn write_dry_run(path: &Path, plan: &ChangePlan) -> Result<()> {
    write_atomic(path, render_dry_run(plan, Local::now()).as_bytes()).await?;
    info!("Dry run output saved to {}", path.display());
    Ok(())
}

/// Save `report` as JSON
pub async fn save_report(path: &Path, report: &ExecutionReport) -> Result<()> {
    let file = ReportFile {
        version: REPORT_FILE_VERSION.to_string(),
        report: report.clone(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    write_atomic(path, json.as_bytes()).await?;
    info!("Execution report saved to {}", path.display());
    Ok(())
}

/// Load a report saved by [`save_report`]
pub async fn load_report(path: &Path) -> Result<ExecutionReport> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|e| Error::input(format!("cannot read report {}: {}", path.display(), e)))?;
    let file: ReportFile = serde_json::from_str(&text)?;

    if file.version != REPORT_FILE_VERSION {
        warn!(
            "Report {} has version {}, expected {}. Attempting to load anyway.",
            path.display(),
            file.version,
            REPORT_FILE_VERSION
        );
    }

    Ok(file.report)
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = temp_path(path);
    {
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            Error::Other(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        file.write_all(contents).await?;
        file.flush().await?;
    }

    fs::rename(&temp_path, path).await.map_err(|e| {
        Error::Other(format!(
            "Failed to rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        ))
    })?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
