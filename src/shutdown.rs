//! Shutdown helpers for background tasks.

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::error;

/// Await every named background task and log the ones that panicked or were
/// aborted. Returns how many failed.
pub async fn join_tasks(tasks: Vec<(&'static str, JoinHandle<()>)>) -> usize {
    let (names, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let mut failed = 0;
    for (task, outcome) in names.into_iter().zip(join_all(handles).await) {
        if let Err(err) = outcome {
            error!(task, %err, "background task failed");
            failed += 1;
        }
    }
    failed
}
