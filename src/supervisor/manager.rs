//! Module supervisor.
//!
//! Owns every [`WatchedProcess`] from the manifest in two name-ordered
//! groups. Each module sits behind its own lock: lifecycle operations on
//! one module serialise, operations on different modules run concurrently.
//! Bulk operations collect per-module failures instead of stopping at the
//! first one.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::process::WatchedProcess;
use crate::config::GlobalConfig;
use crate::models::module::{ModuleInfo, ModuleOrigin, ModuleSpec, ModuleState};
use crate::{AppError, Result};

/// Shared handle to one supervised module.
pub type ModuleHandle = Arc<Mutex<WatchedProcess>>;

/// A module that failed during a bulk operation.
#[derive(Debug)]
pub struct ModuleFailure {
    /// Module name.
    pub name: String,
    /// Why it failed.
    pub error: AppError,
}

/// Result of a bulk lifecycle operation.
#[derive(Debug, Default)]
pub struct BulkReport {
    /// Modules the operation was applied to successfully.
    pub succeeded: Vec<String>,
    /// Modules that failed, each with its own error.
    pub failures: Vec<ModuleFailure>,
}

impl BulkReport {
    /// Whether every module succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

fn registry(
    specs: impl IntoIterator<Item = ModuleSpec>,
    log_root: &Path,
    testing: bool,
) -> BTreeMap<String, ModuleHandle> {
    specs
        .into_iter()
        .map(|spec| {
            let name = spec.name.clone();
            let process = WatchedProcess::new(spec, log_root.to_path_buf(), testing);
            (name, Arc::new(Mutex::new(process)))
        })
        .collect()
}

/// Owns and drives the module registry.
#[derive(Debug)]
pub struct Supervisor {
    bundled: BTreeMap<String, ModuleHandle>,
    system: BTreeMap<String, ModuleHandle>,
    stop_grace: Duration,
}

impl Supervisor {
    /// Build a supervisor with every manifest entry `Stopped`.
    #[must_use]
    pub fn new(
        modules: Vec<ModuleSpec>,
        log_root: &Path,
        testing: bool,
        stop_grace: Duration,
    ) -> Self {
        let (bundled, system): (Vec<_>, Vec<_>) = modules
            .into_iter()
            .partition(|spec| spec.origin == ModuleOrigin::Bundled);
        Self {
            bundled: registry(bundled, log_root, testing),
            system: registry(system, log_root, testing),
            stop_grace,
        }
    }

    /// Build a supervisor from validated configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        let group = |origin: ModuleOrigin| {
            registry(
                config.modules_in(origin).cloned(),
                &config.log_dir,
                config.testing,
            )
        };
        Self {
            bundled: group(ModuleOrigin::Bundled),
            system: group(ModuleOrigin::System),
            stop_grace: config.stop_grace(),
        }
    }

    /// Module names of one group, in name order.
    #[must_use]
    pub fn names(&self, origin: ModuleOrigin) -> Vec<String> {
        self.group(origin).keys().cloned().collect()
    }

    fn group(&self, origin: ModuleOrigin) -> &BTreeMap<String, ModuleHandle> {
        match origin {
            ModuleOrigin::Bundled => &self.bundled,
            ModuleOrigin::System => &self.system,
        }
    }

    /// Every module: bundled group first, each group in name order.
    fn all(&self) -> impl Iterator<Item = (&String, &ModuleHandle)> {
        self.bundled.iter().chain(self.system.iter())
    }

    /// Look a module up by name in either group.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no group contains `name`.
    pub fn get(&self, name: &str) -> Result<&ModuleHandle> {
        self.bundled
            .get(name)
            .or_else(|| self.system.get(name))
            .ok_or_else(|| AppError::NotFound(format!("module {name} not found")))
    }

    /// Start one module. Starting a running module is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown name or `AppError::Spawn`
    /// if the process could not be started.
    pub async fn start(&self, name: &str) -> Result<()> {
        self.get(name)?.lock().await.start()
    }

    /// Stop one module. Stopping a stopped or crashed module is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown name or `AppError::Io`
    /// if the process could not be killed.
    pub async fn stop(&self, name: &str) -> Result<()> {
        self.get(name)?.lock().await.stop(self.stop_grace).await
    }

    /// Stop the module if it is running, start it otherwise.
    ///
    /// # Errors
    ///
    /// Same as [`Supervisor::start`] and [`Supervisor::stop`].
    pub async fn toggle(&self, name: &str) -> Result<()> {
        let mut module = self.get(name)?.lock().await;
        if module.state() == ModuleState::Running && module.is_alive() {
            module.stop(self.stop_grace).await
        } else {
            module.start()
        }
    }

    /// Clear a crashed module back to `Stopped` without restarting it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown name.
    pub async fn acknowledge(&self, name: &str) -> Result<()> {
        self.get(name)?.lock().await.acknowledge();
        Ok(())
    }

    /// Live liveness check against the OS handle.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown name.
    pub async fn is_alive(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.lock().await.is_alive())
    }

    /// Recorded state of one module.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown name.
    pub async fn state(&self, name: &str) -> Result<ModuleState> {
        Ok(self.get(name)?.lock().await.state())
    }

    /// OS process id of one module while it holds a handle.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown name.
    pub async fn pid(&self, name: &str) -> Result<Option<u32>> {
        Ok(self.get(name)?.lock().await.pid())
    }

    /// Newest log content of one module for its mode.
    ///
    /// Unreadable or missing logs yield a placeholder string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown name.
    pub async fn read_log(&self, name: &str) -> Result<String> {
        Ok(self.get(name)?.lock().await.read_log())
    }

    /// Views of every module, bundled first, each group in name order.
    pub async fn modules(&self) -> Vec<ModuleInfo> {
        let mut out = Vec::new();
        for (_, handle) in self.all() {
            out.push(handle.lock().await.info());
        }
        out
    }

    /// Find modules that exited without a stop request.
    ///
    /// Each is moved to `Crashed` and reported once; a crashed module is
    /// reported again only after it has been restarted and exits anew.
    pub async fn unexpected_stops(&self) -> Vec<ModuleInfo> {
        let mut crashed = Vec::new();
        for (_, handle) in self.all() {
            let mut module = handle.lock().await;
            if module.detect_crash() {
                crashed.push(module.info());
            }
        }
        crashed
    }

    /// Start every module in both groups.
    pub async fn start_all(&self) -> BulkReport {
        self.start_matching(|_| true).await
    }

    /// Start the modules whose manifest entry is flagged `autostart`.
    pub async fn start_autostart(&self) -> BulkReport {
        self.start_matching(|spec| spec.autostart).await
    }

    async fn start_matching(&self, wanted: impl Fn(&ModuleSpec) -> bool) -> BulkReport {
        let mut report = BulkReport::default();
        for (name, handle) in self.all() {
            let mut module = handle.lock().await;
            if !wanted(module.spec()) {
                continue;
            }
            match module.start() {
                Ok(()) => report.succeeded.push(name.clone()),
                Err(error) => {
                    warn!(module = name, %error, "module failed to start");
                    report.failures.push(ModuleFailure {
                        name: name.clone(),
                        error,
                    });
                }
            }
        }
        info!(
            started = report.succeeded.len(),
            failed = report.failures.len(),
            "bulk start finished"
        );
        report
    }

    /// Stop every module concurrently and wait for all of them.
    pub async fn stop_all(&self) -> BulkReport {
        let grace = self.stop_grace;
        let stops = self.all().map(|(name, handle)| async move {
            let outcome = handle.lock().await.stop(grace).await;
            (name.clone(), outcome)
        });

        let mut report = BulkReport::default();
        for (name, outcome) in join_all(stops).await {
            match outcome {
                Ok(()) => report.succeeded.push(name),
                Err(error) => {
                    warn!(module = name, %error, "module failed to stop");
                    report.failures.push(ModuleFailure { name, error });
                }
            }
        }
        info!(
            stopped = report.succeeded.len(),
            failed = report.failures.len(),
            "bulk stop finished"
        );
        report
    }
}
