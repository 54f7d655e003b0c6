//! Global configuration parsing and validation, including the module manifest.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::module::{ModuleOrigin, ModuleSpec};
use crate::{AppError, Result};

/// Data-service port in production mode.
pub const PRODUCTION_PORT: u16 = 5600;

/// Data-service port in testing mode.
pub const TESTING_PORT: u16 = 5666;

fn default_poll_interval() -> u64 {
    10
}

fn default_fetch_timeout() -> u64 {
    2
}

fn default_crash_scan() -> u64 {
    5
}

fn default_stop_grace() -> u64 {
    5
}

fn default_log_dir() -> PathBuf {
    default_log_root()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Testing mode: alternate server port, log suffix, `--testing` passthrough.
    #[serde(default)]
    pub testing: bool,
    /// Explicit data-service base URL; derived from `testing` when unset.
    #[serde(default)]
    pub server_url: Option<String>,
    /// Seconds between tracking-status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Per-request HTTP timeout.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
    /// Seconds between fallback unexpected-exit scans.
    #[serde(default = "default_crash_scan")]
    pub crash_scan_seconds: u64,
    /// Grace period between SIGTERM and a forced kill.
    #[serde(default = "default_stop_grace")]
    pub stop_grace_seconds: u64,
    /// Restart crashed modules instead of acknowledging them.
    #[serde(default)]
    pub restart_crashed: bool,
    /// Root directory for per-module log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Module manifest.
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            testing: false,
            server_url: None,
            poll_interval_seconds: default_poll_interval(),
            fetch_timeout_seconds: default_fetch_timeout(),
            crash_scan_seconds: default_crash_scan(),
            stop_grace_seconds: default_stop_grace(),
            restart_crashed: false,
            log_dir: default_log_dir(),
            modules: Vec::new(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Base URL of the local data service.
    #[must_use]
    pub fn server_url(&self) -> String {
        match &self.server_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => default_server_url(self.testing),
        }
    }

    /// Tracking-status poll cadence.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// HTTP timeout for a single fetch.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// Fallback crash-scan cadence.
    #[must_use]
    pub fn crash_scan_interval(&self) -> Duration {
        Duration::from_secs(self.crash_scan_seconds)
    }

    /// Grace period for a graceful stop.
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_seconds)
    }

    /// Manifest entries belonging to one origin group.
    pub fn modules_in(&self, origin: ModuleOrigin) -> impl Iterator<Item = &ModuleSpec> {
        self.modules.iter().filter(move |spec| spec.origin == origin)
    }

    /// Validate intervals and the manifest.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_seconds == 0 {
            return Err(AppError::Config(
                "poll_interval_seconds must be greater than zero".into(),
            ));
        }
        if self.fetch_timeout_seconds == 0 {
            return Err(AppError::Config(
                "fetch_timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.crash_scan_seconds == 0 {
            return Err(AppError::Config(
                "crash_scan_seconds must be greater than zero".into(),
            ));
        }

        let mut seen = HashSet::new();
        for spec in &self.modules {
            if spec.name.trim().is_empty() {
                return Err(AppError::Config("module name must not be empty".into()));
            }
            if spec.command.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "module {} has an empty command",
                    spec.name
                )));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(AppError::Config(format!(
                    "module {} is declared more than once",
                    spec.name
                )));
            }
        }

        Ok(())
    }
}

/// Default data-service base URL for the given mode.
#[must_use]
pub fn default_server_url(testing: bool) -> String {
    let port = if testing { TESTING_PORT } else { PRODUCTION_PORT };
    format!("http://127.0.0.1:{port}")
}

/// Default root for module logs: the user cache directory, else the temp dir.
#[must_use]
pub fn default_log_root() -> PathBuf {
    let cache = env::var_os("XDG_CACHE_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            env::var_os("HOME")
                .filter(|value| !value.is_empty())
                .map(|home| PathBuf::from(home).join(".cache"))
        })
        .unwrap_or_else(env::temp_dir);
    cache.join("activitywatch").join("log")
}
