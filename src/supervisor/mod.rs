//! Module supervision.
//!
//! Covers module process lifecycle, the registry of bundled and system
//! modules, per-module log files, and unexpected-exit detection.

pub mod crash_monitor;
pub mod logs;
pub mod manager;
pub mod process;

pub use manager::{BulkReport, ModuleFailure, Supervisor};
pub use process::WatchedProcess;
