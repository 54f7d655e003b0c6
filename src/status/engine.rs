//! Tracking status engine.
//!
//! Reduces the data service's bucket inventory to a [`StatusSnapshot`].
//! Tracking counts as live only when both an AFK bucket and a desktop
//! window bucket were updated inside the recent window.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::client::StatusClient;
use crate::models::bucket::{buckets_from_inventory, Bucket};
use crate::models::snapshot::StatusSnapshot;

/// Age in seconds under which a bucket update counts as live.
pub const RECENT_WINDOW_SECS: i64 = 600;

/// Age in seconds under which the newest data is stale rather than gone.
pub const STALE_WINDOW_SECS: i64 = 3600;

/// Bucket inventory endpoint.
pub const BUCKETS_PATH: &str = "/api/0/buckets/";

/// Liveness probe endpoint.
pub const INFO_PATH: &str = "/api/0/info";

/// Computes snapshots against one data service.
#[derive(Debug, Clone)]
pub struct StatusEngine {
    client: StatusClient,
}

impl StatusEngine {
    /// Wrap a configured client.
    #[must_use]
    pub fn new(client: StatusClient) -> Self {
        Self { client }
    }

    /// Base URL of the polled service.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Poll the data service and reduce the result. Never fails.
    pub async fn compute_snapshot(&self) -> StatusSnapshot {
        let buckets = match self.client.fetch_object(BUCKETS_PATH).await {
            Some(inventory) if !inventory.is_empty() => buckets_from_inventory(&inventory),
            _ => {
                if self.client.fetch(INFO_PATH).await.is_none() {
                    debug!(base_url = self.base_url(), "data service offline");
                    return StatusSnapshot::offline();
                }
                Vec::new()
            }
        };

        reduce(&buckets, Utc::now())
    }
}

fn age(now: DateTime<Utc>, ts: DateTime<Utc>) -> Duration {
    now.signed_duration_since(ts)
}

fn is_recent(bucket: &Bucket, now: DateTime<Utc>) -> bool {
    bucket
        .last_updated_at()
        .is_some_and(|ts| age(now, ts) <= Duration::seconds(RECENT_WINDOW_SECS))
}

/// Reduce a reachable server's buckets to a snapshot as of `now`.
#[must_use]
pub fn reduce<'a, I>(buckets: I, now: DateTime<Utc>) -> StatusSnapshot
where
    I: IntoIterator<Item = &'a Bucket>,
    I::IntoIter: Clone,
{
    let buckets = buckets.into_iter();

    let last_seen = buckets
        .clone()
        .filter(|bucket| bucket.is_relevant())
        .filter_map(Bucket::last_updated_at)
        .max();

    let afk_recent = buckets
        .clone()
        .any(|bucket| bucket.is_afk() && is_recent(bucket, now));
    let window_recent = buckets
        .clone()
        .any(|bucket| bucket.is_desktop_window() && is_recent(bucket, now));

    let stale = last_seen.is_some_and(|ts| {
        let elapsed = age(now, ts);
        elapsed > Duration::seconds(RECENT_WINDOW_SECS)
            && elapsed <= Duration::seconds(STALE_WINDOW_SECS)
    });

    StatusSnapshot {
        server_reachable: true,
        tracking_active: afk_recent && window_recent,
        afk_recent,
        window_recent,
        stale,
        last_seen,
    }
}
