#![forbid(unsafe_code)]

//! `aw-supervisor` — headless module supervisor and tracking-status reporter.
//!
//! `run` starts the autostart modules, polls tracking status, scans for
//! crashed modules, and stops everything on SIGINT/SIGTERM. `status`
//! prints a single snapshot as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use aw_supervisor::models::module::ModuleOrigin;
use aw_supervisor::models::snapshot::TrackingState;
use aw_supervisor::shutdown::join_tasks;
use aw_supervisor::status::board::spawn_status_poller;
use aw_supervisor::status::{StatusBoard, StatusClient, StatusEngine};
use aw_supervisor::supervisor::crash_monitor::{spawn_crash_monitor, CrashReport};
use aw_supervisor::supervisor::Supervisor;
use aw_supervisor::{AppError, GlobalConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "aw-supervisor", about = "Module supervisor and tracking status", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run in testing mode (alternate server port, `--testing` passed to modules).
    #[arg(long)]
    testing: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Supervise modules and report tracking status until interrupted.
    Run,
    /// Print one tracking-status snapshot as JSON and exit.
    Status,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(dispatch(args))
}

async fn dispatch(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if args.testing {
        config.testing = true;
    }

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Status => print_status(&config).await,
    }
}

fn build_engine(config: &GlobalConfig) -> Result<StatusEngine> {
    let client = StatusClient::new(config.server_url(), config.fetch_timeout())?;
    Ok(StatusEngine::new(client))
}

async fn print_status(config: &GlobalConfig) -> Result<()> {
    let snapshot = build_engine(config)?.compute_snapshot().await;
    let state = snapshot.state();
    let body = serde_json::json!({
        "state": state,
        "label": state.to_string(),
        "detail": snapshot.detail(),
        "last_update": snapshot.last_update_label(),
        "snapshot": snapshot,
    });
    let text = serde_json::to_string_pretty(&body)
        .map_err(|err| AppError::Io(format!("failed to render status: {err}")))?;
    println!("{text}");
    Ok(())
}

async fn run(config: GlobalConfig) -> Result<()> {
    info!(
        testing = config.testing,
        server_url = config.server_url(),
        modules = config.modules.len(),
        "aw-supervisor starting"
    );

    let supervisor = Arc::new(Supervisor::from_config(&config));
    info!(
        bundled = ?supervisor.names(ModuleOrigin::Bundled),
        system = ?supervisor.names(ModuleOrigin::System),
        "module registry loaded"
    );
    let engine = Arc::new(build_engine(&config)?);
    let board = Arc::new(StatusBoard::new());

    // ── Start modules ───────────────────────────────────
    let report = supervisor.start_autostart().await;
    for failure in &report.failures {
        error!(module = failure.name, error = %failure.error, "autostart failed");
    }

    // ── Background tasks ────────────────────────────────
    let ct = CancellationToken::new();
    let poller_handle = spawn_status_poller(
        Arc::clone(&engine),
        Arc::clone(&board),
        config.poll_interval(),
        ct.clone(),
    );
    let (crash_tx, mut crash_rx) = mpsc::channel(16);
    let monitor_handle = spawn_crash_monitor(
        Arc::clone(&supervisor),
        config.crash_scan_interval(),
        crash_tx,
        ct.clone(),
    );

    // ── Presenter loop ──────────────────────────────────
    let mut status_rx = board.subscribe();
    let mut last_state: Option<TrackingState> = None;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = *status_rx.borrow_and_update();
                if let Some(polled) = latest {
                    let state = polled.snapshot.state();
                    if last_state != Some(state) {
                        info!(
                            state = %state,
                            detail = polled.snapshot.detail(),
                            last_update = polled.snapshot.last_update_label(),
                            "tracking status changed"
                        );
                        last_state = Some(state);
                    }
                }
            }
            Some(crash) = crash_rx.recv() => {
                handle_crash(&supervisor, &crash, config.restart_crashed).await;
            }
        }
    }

    // ── Shutdown ────────────────────────────────────────
    ct.cancel();
    let stopped = supervisor.stop_all().await;
    for failure in &stopped.failures {
        error!(module = failure.name, error = %failure.error, "module did not stop cleanly");
    }
    join_tasks(vec![
        ("status poller", poller_handle),
        ("crash monitor", monitor_handle),
    ])
    .await;
    info!("aw-supervisor shut down");

    Ok(())
}

async fn handle_crash(supervisor: &Supervisor, crash: &CrashReport, restart: bool) {
    let name = &crash.module.name;
    warn!(
        module = name,
        status = crash.module.last_exit.as_deref().unwrap_or("status unknown"),
        log_tail = crash.log_tail,
        "module quit unexpectedly"
    );

    let outcome = if restart {
        supervisor.start(name).await
    } else {
        supervisor.acknowledge(name).await
    };
    if let Err(err) = outcome {
        error!(module = name, %err, restart, "failed to handle crashed module");
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
