//! Supervised module model: manifest entries, origin groups, and lifecycle state.

use serde::{Deserialize, Serialize};

/// Where a module comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModuleOrigin {
    /// Shipped alongside the supervisor.
    Bundled,
    /// Installed separately and found on the system.
    System,
}

impl ModuleOrigin {
    /// Lowercase group label as used in the manifest.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bundled => "bundled",
            Self::System => "system",
        }
    }
}

/// Lifecycle state of a watched module.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Not running, either never started or stopped on request.
    Stopped,
    /// Spawned and not known to have exited.
    Running,
    /// Exited without a stop request; stays here until restarted or acknowledged.
    Crashed,
}

impl ModuleState {
    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: ModuleState) -> bool {
        matches!(
            (self, next),
            (ModuleState::Stopped | ModuleState::Crashed, ModuleState::Running)
                | (
                    ModuleState::Running,
                    ModuleState::Stopped | ModuleState::Crashed
                )
                | (ModuleState::Crashed, ModuleState::Stopped)
        )
    }
}

fn default_true() -> bool {
    true
}

/// One manifest entry describing how to launch a module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ModuleSpec {
    /// Module name; unique across the manifest.
    pub name: String,
    /// Origin group.
    pub origin: ModuleOrigin,
    /// Executable to launch.
    pub command: String,
    /// Arguments passed before the optional `--testing` flag.
    #[serde(default)]
    pub args: Vec<String>,
    /// Whether `start_autostart` launches this module.
    #[serde(default = "default_true")]
    pub autostart: bool,
}

/// Point-in-time view of a watched module, safe to hand to a presenter.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module name.
    pub name: String,
    /// Origin group.
    pub origin: ModuleOrigin,
    /// Recorded lifecycle state.
    pub state: ModuleState,
    /// Live liveness check against the OS handle.
    pub alive: bool,
    /// OS process id while a handle is held.
    pub pid: Option<u32>,
    /// Human description of the most recent exit, if any.
    pub last_exit: Option<String>,
}
