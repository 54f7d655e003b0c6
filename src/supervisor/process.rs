//! A single supervised module process.
//!
//! The child handle is owned exclusively by its [`WatchedProcess`] and is
//! spawned with `kill_on_drop(true)`, so releasing the handle never leaves
//! an orphan behind. Output goes to a fresh log file per start.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, info_span, warn, Instrument};

use super::logs;
use crate::models::module::{ModuleInfo, ModuleSpec, ModuleState};
use crate::{AppError, Result};

/// Argument appended to every module command line in testing mode.
pub const TESTING_FLAG: &str = "--testing";

/// Render an exit status for operators.
#[must_use]
pub fn describe_exit(status: Option<ExitStatus>) -> String {
    status.map_or_else(
        || "status unknown".to_owned(),
        |s| {
            if s.success() {
                "exited normally (code 0)".to_owned()
            } else {
                s.code().map_or_else(
                    || "terminated by signal".to_owned(),
                    |c| format!("exited with code {c}"),
                )
            }
        },
    )
}

/// One module under supervision.
#[derive(Debug)]
pub struct WatchedProcess {
    spec: ModuleSpec,
    state: ModuleState,
    child: Option<Child>,
    last_exit: Option<String>,
    log_root: PathBuf,
    testing: bool,
}

impl WatchedProcess {
    /// Create a stopped module from its manifest entry.
    #[must_use]
    pub fn new(spec: ModuleSpec, log_root: PathBuf, testing: bool) -> Self {
        Self {
            spec,
            state: ModuleState::Stopped,
            child: None,
            last_exit: None,
            log_root,
            testing,
        }
    }

    /// Manifest entry this module was built from.
    #[must_use]
    pub fn spec(&self) -> &ModuleSpec {
        &self.spec
    }

    /// Recorded lifecycle state, without consulting the OS.
    #[must_use]
    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// OS process id while a handle is held.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Apply a lifecycle transition, refusing moves the state machine forbids.
    fn transition(&mut self, next: ModuleState) {
        if self.state == next {
            return;
        }
        if self.state.can_transition_to(next) {
            debug!(module = self.spec.name, from = ?self.state, to = ?next, "module state change");
            self.state = next;
        } else {
            warn!(module = self.spec.name, from = ?self.state, to = ?next, "rejected module state change");
        }
    }

    /// Poll the OS handle. `Some` once the child is gone, carrying its exit
    /// status when it could be read; `None` while running or with no handle.
    fn poll_exit(&mut self) -> Option<Option<ExitStatus>> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => Some(Some(status)),
            Ok(None) => None,
            Err(err) => {
                warn!(module = self.spec.name, %err, "failed to poll module process status");
                Some(None)
            }
        }
    }

    /// Live liveness check against the OS handle.
    pub fn is_alive(&mut self) -> bool {
        self.child.is_some() && self.poll_exit().is_none()
    }

    /// Detect an unrequested exit of a running module.
    ///
    /// Moves `Running` to `Crashed` and returns `true` exactly once per crash.
    pub fn detect_crash(&mut self) -> bool {
        if self.state != ModuleState::Running {
            return false;
        }
        let Some(status) = self.poll_exit() else {
            return false;
        };
        let description = describe_exit(status);
        warn!(
            module = self.spec.name,
            status = %description,
            "module quit unexpectedly"
        );
        self.child = None;
        self.last_exit = Some(description);
        self.transition(ModuleState::Crashed);
        true
    }

    /// Start the module. A no-op when it is already running and alive.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the OS refuses to start the process; the
    /// module is then left `Stopped`.
    pub fn start(&mut self) -> Result<()> {
        let span = info_span!(
            "start_module",
            module = self.spec.name,
            origin = self.spec.origin.as_str()
        );
        let _guard = span.enter();

        if self.state == ModuleState::Running {
            if !self.detect_crash() {
                return Ok(());
            }
            info!("restarting module that exited since the last scan");
        }

        let mut cmd = Command::new(&self.spec.command);
        cmd.args(&self.spec.args);
        if self.testing {
            cmd.arg(TESTING_FLAG);
        }

        let (stdout, stderr, log_path) = self.log_streams();
        cmd.stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                if let Some(path) = &log_path {
                    discard_empty_log(path);
                }
                self.transition(ModuleState::Stopped);
                self.child = None;
                return Err(AppError::Spawn(format!(
                    "failed to start {}: {err}",
                    self.spec.name
                )));
            }
        };

        info!(
            pid = child.id().unwrap_or(0),
            command = self.spec.command,
            log = ?log_path,
            "module process spawned"
        );

        self.child = Some(child);
        self.last_exit = None;
        self.transition(ModuleState::Running);
        Ok(())
    }

    fn log_streams(&self) -> (Stdio, Stdio, Option<PathBuf>) {
        let opened = logs::open_new_log(&self.log_root, &self.spec.name, self.testing)
            .and_then(|(path, file)| {
                let copy = file
                    .try_clone()
                    .map_err(|err| AppError::Io(format!("cannot duplicate log handle: {err}")))?;
                Ok((Stdio::from(file), Stdio::from(copy), path))
            });
        match opened {
            Ok((stdout, stderr, path)) => (stdout, stderr, Some(path)),
            Err(err) => {
                warn!(module = self.spec.name, %err, "module output will be discarded");
                (Stdio::null(), Stdio::null(), None)
            }
        }
    }

    /// Stop the module. A no-op unless it is `Running`.
    ///
    /// On unix the process first receives SIGTERM and is force-killed if it
    /// has not exited after `grace`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the process could not be killed. The module
    /// is recorded as `Stopped` either way and its handle released.
    pub async fn stop(&mut self, grace: Duration) -> Result<()> {
        if self.state != ModuleState::Running {
            return Ok(());
        }
        let span = info_span!("stop_module", module = self.spec.name);
        self.stop_running(grace).instrument(span).await
    }

    async fn stop_running(&mut self, grace: Duration) -> Result<()> {
        let outcome = match self.child.take() {
            Some(mut child) => terminate(&mut child, grace).await,
            None => Ok(None),
        };

        self.transition(ModuleState::Stopped);
        match outcome {
            Ok(status) => {
                self.last_exit = Some(describe_exit(status));
                info!("module stopped");
                Ok(())
            }
            Err(err) => {
                warn!(%err, "module did not stop cleanly");
                Err(err)
            }
        }
    }

    /// Clear a crash without restarting. A no-op unless `Crashed`.
    pub fn acknowledge(&mut self) {
        if self.state == ModuleState::Crashed {
            self.transition(ModuleState::Stopped);
        }
    }

    /// Point-in-time view including a live liveness check.
    pub fn info(&mut self) -> ModuleInfo {
        let alive = self.is_alive();
        ModuleInfo {
            name: self.spec.name.clone(),
            origin: self.spec.origin,
            state: self.state,
            alive,
            pid: self.pid(),
            last_exit: self.last_exit.clone(),
        }
    }

    /// Content of this module's newest log for its mode.
    #[must_use]
    pub fn read_log(&self) -> String {
        logs::read_log(&self.log_root, &self.spec.name, self.testing)
    }
}

/// Remove a log file opened for a start that never spawned, so it does not
/// shadow the previous run's output. Files that already hold output stay.
fn discard_empty_log(path: &Path) {
    let empty = fs::metadata(path).is_ok_and(|meta| meta.len() == 0);
    if !empty {
        return;
    }
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), %err, "failed to remove unused log file");
    }
}

/// Ask the child to exit, then force it after `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> Result<Option<ExitStatus>> {
    if let Ok(Some(status)) = child.try_wait() {
        return Ok(Some(status));
    }

    let grace = if request_exit(child) {
        grace
    } else {
        Duration::ZERO
    };

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => Ok(Some(status)),
        Ok(Err(err)) => Err(AppError::Io(format!("failed to wait for module: {err}"))),
        Err(_elapsed) => {
            warn!("module did not exit within grace period, forcing kill");
            child
                .kill()
                .await
                .map_err(|err| AppError::Io(format!("failed to kill module: {err}")))?;
            Ok(None)
        }
    }
}

/// Send SIGTERM. Returns `false` when no signal could be delivered.
#[cfg(unix)]
fn request_exit(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return false;
    };
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => true,
        Err(err) => {
            warn!(pid, %err, "failed to send SIGTERM");
            false
        }
    }
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> bool {
    false
}
