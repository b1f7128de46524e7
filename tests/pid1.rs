//! End-to-end runs of the sandbox binary.
//!
//! These need unprivileged user namespaces. Where they are not available every
//! test returns early after the probe run fails.

extern crate libc;
extern crate sandbox_init;
extern crate tempfile;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use sandbox_init::filesystem::{plan_remounts, MountEntry};
use sandbox_init::supervisor::Termination;
use sandbox_init::{BindMount, Options};

const BINARY: &str = env!("CARGO_BIN_EXE_sandbox-init");

fn sandbox(workdir: &Path, args: &[&str]) -> Output {
    Command::new(BINARY)
        .arg("-W")
        .arg(workdir)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

/// A working directory, or `None` if sandboxes cannot be created here.
fn workdir() -> Option<TempDir> {
    let dir = TempDir::new().unwrap();
    let probe = sandbox(dir.path(), &["--", "true"]);
    if probe.status.success() {
        Some(dir)
    } else {
        eprintln!(
            "skipping, sandbox unavailable: {}",
            String::from_utf8_lossy(&probe.stderr),
        );
        None
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn configuration_drives_the_read_only_pass() {
    let options = Options::from_toml(r#"
        working_directory = "/work"
        tmpfs_directories = ["/tmp"]
        command = ["true"]

        [[bind_mounts]]
        source = "/opt/cache"
        target = "/work/cache"
    "#).unwrap();
    options.validate().unwrap();
    assert_eq!(options.bind_mounts, vec![BindMount::new("/opt/cache", "/work/cache")]);

    let entries: Vec<MountEntry> = [
        "/dev/sda1 / ext4 rw,relatime 0 0",
        "/dev/sda2 /work ext4 rw,nodev 0 0",
        "/dev/sda2 /work/cache ext4 rw,nosuid 0 0",
        "tmpfs /tmp tmpfs rw,nosuid,nodev 0 0",
        "/dev/sda3 /usr ext4 rw 0 0",
    ].iter().filter_map(|line| MountEntry::parse(line)).collect();

    let read_only: Vec<PathBuf> = plan_remounts(&entries, &options.writable_set())
        .into_iter()
        .filter(|remount| remount.is_read_only())
        .map(|remount| remount.directory)
        .collect();

    assert_eq!(read_only, vec![
        PathBuf::from("/"),
        PathBuf::from("/work/cache"),
        PathBuf::from("/usr"),
    ]);
}

#[test]
fn exit_code_contract() {
    assert_eq!(Termination::Exited(0).exit_code(), 0);
    assert_eq!(Termination::Exited(255).exit_code(), 255);
    assert_eq!(Termination::Signaled(libc::SIGINT).exit_code(), 130);
}

#[test]
fn exit_code_passes_through() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let output = sandbox(dir.path(), &["--", "sh", "-c", "exit 7"]);
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn killed_command_exits_with_128_plus_signal() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let output = sandbox(dir.path(), &["--", "sh", "-c", "kill -TERM $$"]);
    assert_eq!(output.status.code(), Some(128 + 15));
}

#[test]
fn missing_executable_is_fatal() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let output = sandbox(dir.path(), &["--", "/nonexistent/program"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("execvp"));
}

#[test]
fn runs_as_pid_one_child() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let output = sandbox(dir.path(), &["--", "sh", "-c", "echo $$"]);
    assert_eq!(stdout(&output), "2");
}

#[test]
fn fake_root() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let output = sandbox(dir.path(), &["-R", "--", "sh", "-c", "echo $(id -u) $(id -g)"]);
    assert_eq!(stdout(&output), "0 0");
}

#[test]
fn fake_hostname() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let output = sandbox(dir.path(), &["-H", "--", "cat", "/proc/sys/kernel/hostname"]);
    assert_eq!(stdout(&output), "localhost");
}

#[test]
fn only_working_directory_is_writable() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let other = TempDir::new().unwrap();

    let script = format!(
        "touch {}/inside && ! touch {}/outside",
        dir.path().display(),
        other.path().display(),
    );
    let output = sandbox(dir.path(), &["--", "sh", "-c", &script]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(dir.path().join("inside").exists());
    assert!(!other.path().join("outside").exists());
}

#[test]
fn writable_paths_stay_writable() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let other = TempDir::new().unwrap();
    let other_path = other.path().to_str().unwrap();

    let script = format!("touch {}/file", other_path);
    let output = sandbox(dir.path(), &["-w", other_path, "--", "sh", "-c", &script]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(other.path().join("file").exists());
}

#[test]
fn tmpfs_hides_contents() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let hidden = TempDir::new().unwrap();
    fs::write(hidden.path().join("secret"), "x").unwrap();
    let hidden_path = hidden.path().to_str().unwrap();

    let script = format!("test ! -e {0}/secret && touch {0}/scratch", hidden_path);
    let output = sandbox(dir.path(), &["-e", hidden_path, "--", "sh", "-c", &script]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(hidden.path().join("secret").exists());
    assert!(!hidden.path().join("scratch").exists());
}

#[test]
fn bind_mounts_are_visible() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    fs::write(source.path().join("data"), "bound").unwrap();

    let script = format!("cat {}/data", target.path().display());
    let output = sandbox(dir.path(), &[
        "-M", source.path().to_str().unwrap(),
        "-m", target.path().to_str().unwrap(),
        "--", "sh", "-c", &script,
    ]);

    assert_eq!(stdout(&output), "bound");
}

/// Start a sandbox in the background and wait until every file in `ready`
/// exists in its working directory.
///
/// Returns the launcher and the outside PID of the init process, or `None`
/// (after cleaning up) if the init process cannot be found.
fn start(dir: &Path, script: &str, ready: &[&str]) -> Option<(Child, String)> {
    let mut launcher = Command::new(BINARY)
        .arg("-W")
        .arg(dir)
        .args(&["--", "sh", "-c", script])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let children = format!("/proc/{0}/task/{0}/children", launcher.id());
    let mut init = None;
    for _ in 0..100 {
        if ready.iter().all(|file| dir.join(file).exists()) {
            init = fs::read_to_string(&children)
                .ok()
                .and_then(|pids| pids.split_whitespace().next().map(str::to_string));
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    match init {
        Some(init) => Some((launcher, init)),
        None => {
            let _ = launcher.kill();
            let _ = launcher.wait();
            None
        }
    }
}

/// The one-letter scheduler state of `pid`.
fn process_state(pid: &str) -> char {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).unwrap();
    let after_name = &stat[stat.rfind(')').unwrap() + 1..];
    after_name.trim_start().chars().next().unwrap()
}

fn send(signal: &str, pid: &str) {
    assert!(Command::new("kill").args(&[signal, pid]).status().unwrap().success());
}

#[test]
fn terminal_signals_do_not_stop_init() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let script = "touch ready; while [ ! -e go ]; do sleep 0.1; done; echo alive";
    let (launcher, init) = match start(dir.path(), script, &["ready"]) {
        Some(started) => started,
        None => return,
    };

    // Sent from outside the namespace, so an init without a disposition for
    // them would be stopped.
    send("-TTOU", &init);
    send("-TTIN", &init);
    thread::sleep(Duration::from_millis(200));
    let state = process_state(&init);

    fs::write(dir.path().join("go"), "").unwrap();
    let output = launcher.wait_with_output().unwrap();

    assert_ne!(state, 'T');
    assert_eq!(stdout(&output), "alive");
    assert!(output.status.success());
}

#[test]
fn signals_reach_the_command_group() {
    let dir = match workdir() { Some(dir) => dir, None => return };
    let script = "\
        sh -c \"trap 'touch got_term; exit 0' TERM; touch child_ready; while :; do sleep 0.1; done\" & \
        trap 'wait; exit 3' TERM; \
        touch ready; \
        while :; do sleep 0.1; done";
    let (mut launcher, init) = match start(dir.path(), script, &["ready", "child_ready"]) {
        Some(started) => started,
        None => return,
    };

    send("-TERM", &init);
    assert_eq!(launcher.wait().unwrap().code(), Some(3));
    assert!(dir.path().join("got_term").exists());
}
