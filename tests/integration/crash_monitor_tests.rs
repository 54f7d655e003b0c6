//! Integration tests for the periodic crash monitor.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use aw_supervisor::models::module::{ModuleOrigin, ModuleState};
use aw_supervisor::supervisor::crash_monitor::{scan, spawn_crash_monitor};
use aw_supervisor::supervisor::Supervisor;

use super::test_helpers::{shell_module, sleeper, wait_until};

#[tokio::test]
async fn scan_attaches_log_tail() {
    let temp = tempfile::tempdir().expect("tempdir");
    let sup = Supervisor::new(
        vec![shell_module(
            "aw-watcher-flaky",
            ModuleOrigin::System,
            "echo boom; exit 3",
        )],
        temp.path(),
        false,
        Duration::from_secs(1),
    );

    sup.start("aw-watcher-flaky").await.expect("start");
    assert!(wait_until(|| async { !sup.is_alive("aw-watcher-flaky").await.unwrap() }).await);

    let reports = scan(&sup).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].module.name, "aw-watcher-flaky");
    assert_eq!(reports[0].module.state, ModuleState::Crashed);
    assert_eq!(reports[0].log_tail, "boom");

    assert!(scan(&sup).await.is_empty());
}

#[tokio::test]
async fn monitor_reports_crash_and_leaves_restart_to_receiver() {
    let temp = tempfile::tempdir().expect("tempdir");
    let sup = Arc::new(Supervisor::new(
        vec![
            shell_module("aw-watcher-flaky", ModuleOrigin::System, "exit 2"),
            sleeper("aw-server", ModuleOrigin::Bundled),
        ],
        temp.path(),
        false,
        Duration::from_secs(1),
    ));
    sup.start_all().await;

    let (tx, mut rx) = mpsc::channel(4);
    let ct = CancellationToken::new();
    let handle = spawn_crash_monitor(
        Arc::clone(&sup),
        Duration::from_millis(100),
        tx,
        ct.clone(),
    );

    let report = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("crash reported in time")
        .expect("monitor alive");
    assert_eq!(report.module.name, "aw-watcher-flaky");
    assert_eq!(report.module.last_exit.as_deref(), Some("exited with code 2"));

    // The monitor never restarts on its own.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        sup.state("aw-watcher-flaky").await.unwrap(),
        ModuleState::Crashed
    );
    assert!(rx.try_recv().is_err(), "crash reported only once");

    ct.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor exits after cancel")
        .expect("monitor task did not panic");

    sup.stop_all().await;
}
