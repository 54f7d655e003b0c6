//! Reduced tracking status produced by one poll of the data service.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one status poll. Immutable once built.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Whether the data service answered either the buckets or the info call.
    pub server_reachable: bool,
    /// Both AFK and desktop window data are recent.
    pub tracking_active: bool,
    /// Some AFK bucket was updated within the recent window.
    pub afk_recent: bool,
    /// Some non-Android window bucket was updated within the recent window.
    pub window_recent: bool,
    /// Newest data is older than the recent window but inside the stale window.
    pub stale: bool,
    /// Newest `last_updated` across AFK and window buckets.
    pub last_seen: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// The fixed snapshot returned when the data service is unreachable.
    #[must_use]
    pub fn offline() -> Self {
        Self::default()
    }

    /// Collapse the flags into a single presentable state.
    #[must_use]
    pub fn state(&self) -> TrackingState {
        if !self.server_reachable {
            TrackingState::Offline
        } else if self.tracking_active {
            TrackingState::Tracking
        } else if self.stale {
            TrackingState::Stale
        } else {
            TrackingState::NotTracking
        }
    }

    /// One-line detail, e.g. `not tracking (afk: ok, window: no)`.
    #[must_use]
    pub fn detail(&self) -> String {
        if !self.server_reachable {
            return "server offline".to_owned();
        }
        format!(
            "{} (afk: {}, window: {})",
            if self.tracking_active {
                "tracking"
            } else {
                "not tracking"
            },
            ok_or_no(self.afk_recent),
            ok_or_no(self.window_recent),
        )
    }

    /// `last update: HH:MM` in local time, or a dash when nothing was seen.
    #[must_use]
    pub fn last_update_label(&self) -> String {
        self.last_seen.map_or_else(
            || "last update: \u{2014}".to_owned(),
            |ts| format!("last update: {}", ts.with_timezone(&Local).format("%H:%M")),
        )
    }
}

fn ok_or_no(flag: bool) -> &'static str {
    if flag {
        "ok"
    } else {
        "no"
    }
}

/// Presentable tracking state derived from a [`StatusSnapshot`].
///
/// `Stale` and `NotTracking` are kept apart so a consumer can tell
/// "recently stopped" from "no recent data at all".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// Data service unreachable.
    Offline,
    /// Both signals are live.
    Tracking,
    /// Data stopped arriving between 10 and 60 minutes ago.
    Stale,
    /// Server up but tracking is not live.
    NotTracking,
}

impl Display for TrackingState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Offline => "server offline",
            Self::Tracking => "tracking",
            Self::Stale => "tracking (stale)",
            Self::NotTracking => "not tracking",
        };
        f.write_str(label)
    }
}
