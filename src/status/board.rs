//! Snapshot publication and the periodic status poller.
//!
//! Every poll draws a sequence number from the [`StatusBoard`] before it
//! starts. A finished poll is published only if no later-started poll has
//! already been published, so an on-demand refresh that overlaps the timer
//! tick can never roll the visible state back. Consumers observe the
//! current value through a `tokio::sync::watch` receiver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::engine::StatusEngine;
use crate::models::snapshot::StatusSnapshot;

/// A snapshot tagged with the poll that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolledSnapshot {
    /// Sequence number drawn when the poll started.
    pub seq: u64,
    /// When the poll result was published.
    pub polled_at: DateTime<Utc>,
    /// The reduced status.
    pub snapshot: StatusSnapshot,
}

/// Holds the most recently started-and-completed snapshot.
#[derive(Debug)]
pub struct StatusBoard {
    next_seq: AtomicU64,
    tx: watch::Sender<Option<PolledSnapshot>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            next_seq: AtomicU64::new(0),
            tx,
        }
    }

    /// Reserve the sequence number for a poll about to start.
    pub fn begin_poll(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish a finished poll. Returns `false` when a newer poll already won.
    pub fn publish(&self, seq: u64, snapshot: StatusSnapshot) -> bool {
        let accepted = self.tx.send_if_modified(|current| {
            if current.as_ref().is_some_and(|existing| existing.seq >= seq) {
                return false;
            }
            *current = Some(PolledSnapshot {
                seq,
                polled_at: Utc::now(),
                snapshot,
            });
            true
        });
        if !accepted {
            debug!(seq, "dropping out-of-order poll result");
        }
        accepted
    }

    /// Latest published snapshot, if any poll has completed.
    #[must_use]
    pub fn latest(&self) -> Option<PolledSnapshot> {
        *self.tx.borrow()
    }

    /// Receiver notified on every accepted publication.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<PolledSnapshot>> {
        self.tx.subscribe()
    }
}

/// Run one poll and publish its result.
///
/// Returns the published snapshot, or `None` if a newer poll had already
/// been published by the time this one finished.
pub async fn poll_once(engine: &StatusEngine, board: &StatusBoard) -> Option<PolledSnapshot> {
    let seq = board.begin_poll();
    let snapshot = engine.compute_snapshot().await;
    if board.publish(seq, snapshot) {
        board.latest()
    } else {
        None
    }
}

/// Trigger an out-of-band poll, e.g. when a menu is about to be shown.
#[must_use]
pub fn refresh_now(engine: Arc<StatusEngine>, board: Arc<StatusBoard>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = poll_once(&engine, &board).await;
    })
}

/// Spawn the periodic status poller.
///
/// The first poll runs immediately, then every `interval` until `cancel`
/// fires. An in-flight fetch is abandoned on cancellation; its lifetime is
/// already bounded by the client timeout.
#[must_use]
pub fn spawn_status_poller(
    engine: Arc<StatusEngine>,
    board: Arc<StatusBoard>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("status poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        () = cancel.cancelled() => {
                            info!("status poller shutting down");
                            break;
                        }
                        _ = poll_once(&engine, &board) => {}
                    }
                }
            }
        }
    })
}
