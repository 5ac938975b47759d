// # zonesync - DNS zone reconciler
//
// Thin command-line layer over zonesync-core:
//
// 1. Parse arguments and load the YAML configuration
// 2. Install logging
// 3. Register backends and connect the configured one
// 4. Read the CSV, plan, guard and execute (or roll back a saved report)
// 5. Print reports and map the result to an exit code
//
// Planning and execution logic lives in zonesync-core.
//
// ## Example
//
// ```bash
// zonesync -f hosts.csv -z example.com --dry-run -o plan.txt
// zonesync -f hosts.csv -z example.com --save-report run.json
// zonesync -z example.com --rollback run.json
// ```

use anyhow::Context;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use zonesync_core::config::LoggingConfig;
use zonesync_core::report::{
    load_report, render_execution, render_plan_table, render_rejected, save_report, write_dry_run,
};
use zonesync_core::{
    BackendRegistry, DnsBackend, EngineEvent, Error, ErrorClass, ExecutionMode, ExecutionReport,
    Reconciler, Result, SafePlan, Zone, ZonesyncConfig, input,
};

/// Config file read when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

/// Exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZonesyncExitCode {
    /// Every action applied or skipped
    Success = 0,
    /// Configuration or input error
    SetupError = 1,
    /// At least one action failed
    ActionsFailed = 2,
    /// The plan touched a name outside the zone
    ZoneViolation = 3,
    /// Backend unreachable, or the zone could not be enumerated
    BackendError = 4,
}

impl From<ZonesyncExitCode> for ExitCode {
    fn from(code: ZonesyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<ErrorClass> for ZonesyncExitCode {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::Setup => ZonesyncExitCode::SetupError,
            ErrorClass::ZoneViolation => ZonesyncExitCode::ZoneViolation,
            ErrorClass::Backend => ZonesyncExitCode::BackendError,
        }
    }
}

/// Reconcile the A records of a DNS zone with a CSV file
#[derive(Debug, Parser)]
#[command(name = "zonesync", version, about)]
struct Cli {
    /// CSV file with `FQDN` and `IPv4` columns
    #[arg(short = 'f', long = "csv", value_name = "PATH", required_unless_present = "rollback")]
    csv: Option<PathBuf>,

    /// Zone to reconcile; nothing outside it is touched
    #[arg(short, long)]
    zone: String,

    /// YAML configuration file [default: configs/config.yaml]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show the plan without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Write the dry-run summary to this file
    #[arg(short = 'o', long, value_name = "PATH", requires = "dry_run")]
    output_file: Option<PathBuf>,

    /// Save the execution report as JSON
    #[arg(long, value_name = "PATH")]
    save_report: Option<PathBuf>,

    /// Undo the applied changes of a saved live report
    #[arg(long, value_name = "REPORT", conflicts_with = "csv")]
    rollback: Option<PathBuf>,
}

impl Cli {
    fn mode(&self) -> ExecutionMode {
        if self.dry_run {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Live
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ZonesyncExitCode::SetupError.into()
            } else {
                ZonesyncExitCode::Success.into()
            };
        }
    };

    let (config_path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    let config = match ZonesyncConfig::load_or_default(&config_path, explicit) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ZonesyncExitCode::SetupError.into();
        }
    };

    if let Err(e) = init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to set up logging: {:#}", e);
        return ZonesyncExitCode::SetupError.into();
    }

    // load_or_default ran before logging existed
    if !explicit && !config_path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            config_path.display()
        );
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZonesyncExitCode::SetupError.into();
        }
    };

    let code = rt.block_on(async {
        match run(&cli, &config).await {
            Ok(report) if report.has_failures() => {
                error!(
                    "{} of {} actions failed",
                    report.summary.failed,
                    report.actions.len()
                );
                ZonesyncExitCode::ActionsFailed
            }
            Ok(_) => ZonesyncExitCode::Success,
            Err(e) => {
                error!("{}", e);
                ZonesyncExitCode::from(e.class())
            }
        }
    });

    code.into()
}

/// Install the fmt subscriber
///
/// `-v` forces debug; otherwise `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(logging.level.to_ascii_lowercase()))
    };

    let builder = FmtSubscriber::builder().with_env_filter(filter);

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(std::io::stdout.and(Mutex::new(file)))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            tracing::subscriber::set_global_default(builder.finish())?;
        }
    }

    Ok(())
}

/// Connect, reconcile (or roll back) and report
async fn run(cli: &Cli, config: &ZonesyncConfig) -> Result<ExecutionReport> {
    let zone = Zone::parse(&cli.zone)?;

    let registry = BackendRegistry::with_builtin();

    #[cfg(feature = "bind")]
    zonesync_backend_bind::register(&registry);

    let provider = config.provider_config()?;
    info!(
        "Starting zonesync for zone {} via provider '{}' ({})",
        zone,
        provider.provider,
        cli.mode()
    );

    let backend: Arc<dyn DnsBackend> = Arc::from(registry.connect(&provider)?);
    let (reconciler, events) = Reconciler::new(backend, config.engine.clone())?;
    let drain = tokio::spawn(drain_events(events));

    let result = match &cli.rollback {
        Some(path) => plan_rollback(&reconciler, &zone, path).await,
        None => plan_from_csv(&reconciler, &zone, cli.csv.as_deref()).await,
    };

    let result = match result {
        Ok(plan) => execute(&reconciler, &plan, cli).await,
        Err(e) => Err(e),
    };

    drop(reconciler);
    let _ = drain.await;
    result
}

async fn plan_from_csv(
    reconciler: &Reconciler,
    zone: &Zone,
    csv: Option<&Path>,
) -> Result<SafePlan> {
    let csv = csv.ok_or_else(|| Error::input("--csv is required"))?;
    let parsed = input::parse_file(csv)?;

    let rejected = render_rejected(&parsed.rejected);
    if !rejected.is_empty() {
        print!("{}", rejected);
    }

    let desired = parsed.into_desired()?;
    reconciler.plan(zone, &desired).await
}

async fn plan_rollback(reconciler: &Reconciler, zone: &Zone, path: &Path) -> Result<SafePlan> {
    let saved = load_report(path).await?;
    if saved.zone != *zone {
        return Err(Error::input(format!(
            "report {} is for zone {}, not {}",
            path.display(),
            saved.zone,
            zone
        )));
    }

    info!(
        "Rolling back {} applied changes from {}",
        saved.summary.applied,
        path.display()
    );
    reconciler.plan_rollback(&saved)
}

async fn execute(reconciler: &Reconciler, plan: &SafePlan, cli: &Cli) -> Result<ExecutionReport> {
    print!("{}", render_plan_table(plan.plan()));

    if let Some(path) = &cli.output_file {
        write_dry_run(path, plan.plan()).await?;
    }

    let report = reconciler.apply(plan, cli.mode()).await;
    print!("{}", render_execution(&report));

    if let Some(path) = &cli.save_report {
        persist_report(path, &report).await;
    }

    Ok(report)
}

/// Save `report`, logging rather than returning a failure
///
/// The changes are already applied at this point, so the exit code must
/// still describe the actions.
async fn persist_report(path: &Path, report: &ExecutionReport) -> bool {
    match save_report(path, report).await {
        Ok(()) => {
            info!("Saved execution report to {}", path.display());
            true
        }
        Err(e) => {
            error!(
                "Failed to save execution report to {}: {}; {} changes were applied",
                path.display(),
                e,
                report.summary.applied
            );
            false
        }
    }
}

async fn drain_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}
