//! Crash monitor: periodic fallback scan for unexpected module exits.
//!
//! Runs [`Supervisor::unexpected_stops`] on a fixed cadence and forwards
//! each detection on an `mpsc` channel. It only reports; whether a crashed
//! module is restarted or acknowledged is up to the receiver.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::logs;
use super::manager::Supervisor;
use crate::models::module::ModuleInfo;

/// Number of trailing log lines attached to a crash report.
pub const REPORT_LOG_LINES: usize = 20;

/// One detected unexpected exit.
#[derive(Debug, Clone)]
pub struct CrashReport {
    /// State of the module right after detection.
    pub module: ModuleInfo,
    /// Tail of the module's newest log.
    pub log_tail: String,
}

/// Scan once and build reports for every newly crashed module.
pub async fn scan(supervisor: &Supervisor) -> Vec<CrashReport> {
    let mut reports = Vec::new();
    for module in supervisor.unexpected_stops().await {
        let log = supervisor
            .read_log(&module.name)
            .await
            .unwrap_or_default();
        reports.push(CrashReport {
            log_tail: logs::tail(&log, REPORT_LOG_LINES),
            module,
        });
    }
    reports
}

/// Spawn the crash monitor.
///
/// The task scans every `interval` until `cancel` fires or the receiving
/// side of `reports` is dropped.
#[must_use]
pub fn spawn_crash_monitor(
    supervisor: Arc<Supervisor>,
    interval: Duration,
    reports: mpsc::Sender<CrashReport>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("crash monitor shutting down");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
            }

            for report in scan(&supervisor).await {
                if reports.send(report).await.is_err() {
                    debug!("crash report receiver dropped, stopping monitor");
                    return;
                }
            }
        }
    })
}
