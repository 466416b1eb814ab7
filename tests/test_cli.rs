//! Integration tests for the filelock CLI binary
//!
//! Every invocation runs inside a scratch directory that carries a `.git`
//! marker so config discovery never escapes into the surrounding checkout,
//! and with the `FILELOCK_*` environment cleared.

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

use filelock::FileLock;

fn scratch() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    dir
}

fn filelock_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("filelock"));
    cmd.current_dir(cwd)
        .env_remove("FILELOCK_CONFIG")
        .env_remove("FILELOCK_TIMEOUT")
        .env_remove("FILELOCK_POLL_INTERVAL_MS")
        .env_remove("FILELOCK_BACKEND")
        .env_remove("RUST_LOG")
        .stdin(Stdio::null());
    cmd
}

#[test]
fn probe_reports_free_lock() {
    let dir = scratch();
    let lock_path = dir.path().join("x.lock");

    filelock_cmd(dir.path())
        .arg("probe")
        .arg(&lock_path)
        .assert()
        .success()
        .stdout(predicate::str::diff("free\n"));
}

#[test]
fn probe_reports_held_lock_with_exit_nine() {
    let dir = scratch();
    let lock_path = dir.path().join("x.lock");
    let holder = FileLock::new(&lock_path);
    holder.acquire().unwrap();

    filelock_cmd(dir.path())
        .arg("probe")
        .arg(&lock_path)
        .assert()
        .code(9)
        .stdout(predicate::str::diff("held\n"));

    holder.release().unwrap();
}

#[test]
fn run_times_out_while_lock_is_held() {
    let dir = scratch();
    let lock_path = dir.path().join("x.lock");
    let holder = FileLock::new(&lock_path);
    let _guard = holder.lock().unwrap();

    filelock_cmd(dir.path())
        .arg("run")
        .arg(&lock_path)
        .args(["--timeout", "0.1", "--poll-interval", "10", "--"])
        .args(probe_child())
        .assert()
        .code(9)
        .stderr(predicate::str::contains("Failed to acquire lock"));
}

#[test]
fn run_rejects_unknown_backend() {
    let dir = scratch();
    filelock_cmd(dir.path())
        .args(["run", "x.lock", "--backend", "nfs", "--"])
        .args(probe_child())
        .assert()
        .code(2);
}

#[test]
fn invalid_config_file_maps_to_exit_two() {
    let dir = scratch();
    fs::write(
        dir.path().join(".filelock.toml"),
        "[lock]\npoll_interval_ms = 0\n",
    )
    .unwrap();

    filelock_cmd(dir.path())
        .args(["probe", "x.lock"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("poll_interval"));
}

#[test]
fn missing_explicit_config_maps_to_exit_two() {
    let dir = scratch();
    filelock_cmd(dir.path())
        .args(["probe", "x.lock", "--config", "does-not-exist.toml"])
        .assert()
        .code(2);
}

#[test]
fn env_backend_override_is_validated() {
    let dir = scratch();
    filelock_cmd(dir.path())
        .env("FILELOCK_BACKEND", "carrier-pigeon")
        .args(["probe", "x.lock"])
        .assert()
        .code(2);
}

#[test]
fn soft_backend_probe_leaves_no_file() {
    let dir = scratch();
    let lock_path = dir.path().join("soft.lock");

    filelock_cmd(dir.path())
        .args(["probe", "--backend", "soft"])
        .arg(&lock_path)
        .assert()
        .success()
        .stdout(predicate::str::diff("free\n"));
    assert!(!lock_path.exists());
}

#[cfg(unix)]
fn probe_child() -> [&'static str; 1] {
    ["true"]
}

#[cfg(windows)]
fn probe_child() -> [&'static str; 3] {
    ["cmd", "/C", "exit 0"]
}

#[cfg(unix)]
mod unix {
    use super::*;
    use filelock::LockOptions;
    use std::time::Duration;

    #[test]
    fn run_passes_child_exit_code_through() {
        let dir = scratch();
        filelock_cmd(dir.path())
            .args(["run", "x.lock", "--", "sh", "-c", "exit 3"])
            .assert()
            .code(3);
    }

    #[test]
    fn run_child_exit_nine_is_not_reported_as_timeout() {
        let dir = scratch();
        filelock_cmd(dir.path())
            .args(["run", "x.lock", "--", "sh", "-c", "exit 9"])
            .assert()
            .code(9)
            .stderr(predicate::str::contains("Failed to acquire lock").not());
    }

    #[test]
    fn run_holds_lock_while_child_runs() {
        let dir = scratch();
        let lock_path = dir.path().join("x.lock");
        let marker = dir.path().join("child-ran");

        // The child probes the same lock from a third process; it must be held.
        let script = format!(
            "\"$FILELOCK_BIN\" probe '{}' > '{}'",
            lock_path.display(),
            marker.display()
        );
        filelock_cmd(dir.path())
            .env("FILELOCK_BIN", assert_cmd::cargo::cargo_bin!("filelock"))
            .arg("run")
            .arg(&lock_path)
            .args(["--", "sh", "-c", &script])
            .assert()
            .code(9);

        assert_eq!(fs::read_to_string(&marker).unwrap(), "held\n");
        assert!(lock_path.exists(), "kernel lock file is never removed");

        // Released after the child exited.
        let lock = FileLock::with_options(
            &lock_path,
            LockOptions::default().with_timeout(Some(Duration::ZERO)),
        )
        .unwrap();
        lock.acquire().unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn run_creates_parent_dirs_when_asked() {
        let dir = scratch();
        let lock_path = dir.path().join("nested/deeper/x.lock");

        filelock_cmd(dir.path())
            .arg("run")
            .arg(&lock_path)
            .args(["--create-parent-dirs", "--", "true"])
            .assert()
            .success();
        assert!(lock_path.exists());
    }
}
