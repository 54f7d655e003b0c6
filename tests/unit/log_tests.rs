//! Unit tests for module log file layout and reading.

use std::fs;

use serial_test::serial;

use aw_supervisor::config::default_log_root;
use aw_supervisor::supervisor::logs::{
    latest_log_path, log_file_prefix, module_log_dir, new_log_path, open_new_log, read_log, tail,
};

#[test]
fn prefix_distinguishes_testing_mode() {
    assert_eq!(log_file_prefix("aw-server", false), "aw-server_");
    assert_eq!(log_file_prefix("aw-server", true), "aw-server-testing_");
}

#[test]
fn new_log_path_lives_in_module_dir() {
    let root = std::path::Path::new("/logs");
    let path = new_log_path(root, "aw-watcher-afk", true);
    assert_eq!(path.parent(), Some(module_log_dir(root, "aw-watcher-afk").as_path()));
    let file = path.file_name().unwrap().to_str().unwrap();
    assert!(file.starts_with("aw-watcher-afk-testing_"));
    assert!(file.ends_with(".log"));
}

#[test]
fn log_paths_have_sub_second_stamps() {
    let root = std::path::Path::new("/logs");
    let first = new_log_path(root, "aw-server", false);
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = new_log_path(root, "aw-server", false);
    assert_ne!(first, second);
    assert!(first < second, "newer start must sort last");
}

#[test]
fn read_log_returns_newest_file_for_mode() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = module_log_dir(temp.path(), "aw-watcher-afk");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("aw-watcher-afk_2026-01-01T10-00-00.log"), "old run").unwrap();
    fs::write(dir.join("aw-watcher-afk_2026-02-01T10-00-00.log"), "new run").unwrap();
    fs::write(
        dir.join("aw-watcher-afk-testing_2026-03-01T10-00-00.log"),
        "testing run",
    )
    .unwrap();

    assert_eq!(read_log(temp.path(), "aw-watcher-afk", false), "new run");
    assert_eq!(read_log(temp.path(), "aw-watcher-afk", true), "testing run");
}

#[test]
fn read_log_without_files_yields_placeholder() {
    let temp = tempfile::tempdir().expect("tempdir");
    let text = read_log(temp.path(), "aw-watcher-window", false);
    assert_eq!(text, "no log file found for aw-watcher-window");
    assert!(latest_log_path(temp.path(), "aw-watcher-window", false).is_none());
}

#[test]
fn unrelated_files_are_ignored() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = module_log_dir(temp.path(), "aw-server");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("aw-server_2026-01-01T10-00-00.txt"), "wrong ext").unwrap();
    fs::write(dir.join("other_2026-01-01T10-00-00.log"), "wrong name").unwrap();
    assert!(latest_log_path(temp.path(), "aw-server", false).is_none());
}

#[test]
fn open_new_log_creates_directories() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("nested").join("logs");
    let (path, _file) = open_new_log(&root, "aw-server", false).expect("log opens");
    assert!(path.exists());
    assert_eq!(latest_log_path(&root, "aw-server", false), Some(path));
}

#[test]
fn tail_keeps_last_lines() {
    let text = "one\ntwo\nthree\nfour";
    assert_eq!(tail(text, 2), "three\nfour");
    assert_eq!(tail(text, 10), text);
    assert_eq!(tail("", 3), "");
}

#[test]
#[serial]
fn default_log_root_prefers_xdg_cache() {
    let old_xdg = std::env::var_os("XDG_CACHE_HOME");
    std::env::set_var("XDG_CACHE_HOME", "/tmp/xdg-cache");
    let root = default_log_root();
    match old_xdg {
        Some(value) => std::env::set_var("XDG_CACHE_HOME", value),
        None => std::env::remove_var("XDG_CACHE_HOME"),
    }
    assert_eq!(
        root,
        std::path::PathBuf::from("/tmp/xdg-cache/activitywatch/log")
    );
}

#[test]
#[serial]
fn default_log_root_falls_back_to_home_cache() {
    let old_xdg = std::env::var_os("XDG_CACHE_HOME");
    let old_home = std::env::var_os("HOME");
    std::env::remove_var("XDG_CACHE_HOME");
    std::env::set_var("HOME", "/home/tester");
    let root = default_log_root();
    if let Some(value) = old_xdg {
        std::env::set_var("XDG_CACHE_HOME", value);
    }
    match old_home {
        Some(value) => std::env::set_var("HOME", value),
        None => std::env::remove_var("HOME"),
    }
    assert_eq!(
        root,
        std::path::PathBuf::from("/home/tester/.cache/activitywatch/log")
    );
}
