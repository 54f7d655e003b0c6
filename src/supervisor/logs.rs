//! Per-module log files.
//!
//! Layout: `{root}/{name}/{name}[-testing]_{YYYY-MM-DDTHH-MM-SS.mmm}.log`.
//! Timestamps sort lexicographically, so the newest file is the last one.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::{AppError, Result};

/// Directory holding every log file of one module.
#[must_use]
pub fn module_log_dir(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

/// File-name prefix shared by all log files of a module in one mode.
#[must_use]
pub fn log_file_prefix(name: &str, testing: bool) -> String {
    if testing {
        format!("{name}-testing_")
    } else {
        format!("{name}_")
    }
}

/// Path for a log file started now.
#[must_use]
pub fn new_log_path(root: &Path, name: &str, testing: bool) -> PathBuf {
    let stamp = Local::now().format("%Y-%m-%dT%H-%M-%S%.3f");
    module_log_dir(root, name).join(format!("{}{stamp}.log", log_file_prefix(name, testing)))
}

/// Create the log directory and open a fresh log file for appending.
///
/// # Errors
///
/// Returns `AppError::Io` if the directory or file cannot be created.
pub fn open_new_log(root: &Path, name: &str, testing: bool) -> Result<(PathBuf, File)> {
    let dir = module_log_dir(root, name);
    fs::create_dir_all(&dir)
        .map_err(|err| AppError::Io(format!("cannot create log dir {}: {err}", dir.display())))?;
    let path = new_log_path(root, name, testing);
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| AppError::Io(format!("cannot open log {}: {err}", path.display())))?;
    Ok((path, file))
}

/// Newest log file of a module in the given mode.
#[must_use]
pub fn latest_log_path(root: &Path, name: &str, testing: bool) -> Option<PathBuf> {
    let prefix = log_file_prefix(name, testing);
    let entries = fs::read_dir(module_log_dir(root, name)).ok()?;
    entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|file| file.starts_with(&prefix) && file.ends_with(".log"))
        })
        .map(|entry| entry.path())
        .max()
}

/// Read the newest log of a module for diagnostic display.
///
/// Never fails: a missing or unreadable log yields a placeholder line.
#[must_use]
pub fn read_log(root: &Path, name: &str, testing: bool) -> String {
    let Some(path) = latest_log_path(root, name, testing) else {
        return format!("no log file found for {name}");
    };
    match fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => format!("could not read log for {name} ({}): {err}", path.display()),
    }
}

/// Last `lines` lines of `text`.
#[must_use]
pub fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
