// tests/process_supervision.rs
#![cfg(unix)]

mod common;
use crate::common::init_tracing;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::sync::mpsc;
use tokio::time::timeout;

use relaunch::engine::RuntimeEvent;
use relaunch::exec::builder::{spawn_builder, BuildSpec};
use relaunch::exec::runner::{spawn_runner, RunSpec};
use relaunch::exec::LeafHandle;
use relaunch::types::{FailureSource, RunMode};

fn runner(dir: &Path, command: &str, mode: RunMode) -> (LeafHandle, mpsc::Receiver<RuntimeEvent>) {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let handle = spawn_runner(
        RunSpec {
            command_line: command.to_string(),
            mode,
            workdir: dir.to_path_buf(),
            grace: Duration::from_millis(300),
        },
        tx,
    );
    (handle, rx)
}

fn builder(dir: &Path, command: &str) -> (LeafHandle, mpsc::Receiver<RuntimeEvent>) {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let handle = spawn_builder(
        BuildSpec {
            command_line: command.to_string(),
            target_dir: dir.join("tmp"),
            workdir: dir.to_path_buf(),
            grace: Duration::from_millis(300),
        },
        tx,
    );
    (handle, rx)
}

async fn next_event(rx: &mut mpsc::Receiver<RuntimeEvent>) -> RuntimeEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event within 5s")
        .expect("event channel closed")
}

/// Pids appended to `pids.txt` by the test commands, once `count` exist.
async fn wait_for_pids(dir: &Path, count: usize) -> Vec<i32> {
    let path: PathBuf = dir.join("pids.txt");
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let pids: Vec<i32> = fs::read_to_string(&path)
            .unwrap_or_default()
            .lines()
            .filter_map(|l| l.trim().parse().ok())
            .collect();
        if pids.len() >= count {
            return pids;
        }
        assert!(Instant::now() < deadline, "only {} pids recorded", pids.len());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn is_alive(pid: i32) -> bool {
    !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

/// Killed orphans are reaped by init, not by us; give that a moment.
async fn died_within(pid: i32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    !is_alive(pid)
}

#[tokio::test]
async fn restart_kills_previous_generation_first() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, mut events) = runner(dir.path(), "echo $$ >> pids.txt; exec sleep 30", RunMode::Background);

    runner.start().await.unwrap();
    assert!(matches!(next_event(&mut events).await, RuntimeEvent::Restarted));
    let first = wait_for_pids(dir.path(), 1).await[0];
    assert!(is_alive(first));

    runner.start().await.unwrap();
    assert!(matches!(next_event(&mut events).await, RuntimeEvent::Restarted));
    let pids = wait_for_pids(dir.path(), 2).await;

    assert!(!is_alive(first), "first generation still alive");
    assert!(is_alive(pids[1]));

    runner.stop(Duration::from_secs(2)).await;
    assert!(!is_alive(pids[1]));

    // Killing by the supervisor is never reported as a failure.
    assert!(timeout(Duration::from_millis(300), events.recv()).await.is_err());
}

#[tokio::test]
async fn children_left_by_an_exited_leader_die_on_restart_and_stop() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, mut events) = runner(
        dir.path(),
        "sleep 30 & echo $! >> pids.txt; exit 0",
        RunMode::Background,
    );

    runner.start().await.unwrap();
    assert!(matches!(next_event(&mut events).await, RuntimeEvent::Restarted));
    let first = wait_for_pids(dir.path(), 1).await[0];
    assert!(is_alive(first));

    runner.start().await.unwrap();
    assert!(matches!(next_event(&mut events).await, RuntimeEvent::Restarted));
    let second = wait_for_pids(dir.path(), 2).await[1];
    assert!(died_within(first, Duration::from_secs(2)).await, "first generation outlived restart");

    runner.stop(Duration::from_secs(2)).await;
    assert!(died_within(second, Duration::from_secs(2)).await, "second generation outlived stop");
}

#[tokio::test]
async fn wait_mode_leftovers_die_on_stop() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, mut events) = runner(dir.path(), "sleep 30 & echo $! >> pids.txt; exit 0", RunMode::Wait);

    runner.start().await.unwrap();
    assert!(matches!(next_event(&mut events).await, RuntimeEvent::Restarted));
    let pid = wait_for_pids(dir.path(), 1).await[0];
    assert!(is_alive(pid));

    runner.stop(Duration::from_secs(2)).await;
    assert!(died_within(pid, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn stop_is_idempotent_and_safe_with_nothing_running() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, _events) = runner(dir.path(), "exec sleep 30", RunMode::Background);

    runner.stop(Duration::from_secs(1)).await;
    runner.start().await.unwrap();
    runner.stop(Duration::from_secs(2)).await;
    runner.stop(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn sigterm_ignoring_group_is_killed_after_grace() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, mut events) = runner(
        dir.path(),
        "trap '' TERM; echo $$ >> pids.txt; while true; do sleep 0.1; done",
        RunMode::Background,
    );

    runner.start().await.unwrap();
    assert!(matches!(next_event(&mut events).await, RuntimeEvent::Restarted));
    let pid = wait_for_pids(dir.path(), 1).await[0];

    let started = Instant::now();
    runner.stop(Duration::from_secs(3)).await;
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(!is_alive(pid));
}

#[tokio::test]
async fn background_crash_reports_captured_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, mut events) = runner(dir.path(), "echo 'listen: address in use' >&2; exit 3", RunMode::Background);

    runner.start().await.unwrap();
    assert!(matches!(next_event(&mut events).await, RuntimeEvent::Restarted));

    match next_event(&mut events).await {
        RuntimeEvent::Errored { source, text } => {
            assert_eq!(source, FailureSource::Run);
            assert_eq!(text, "listen: address in use\n");
        }
        other => panic!("expected Errored, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_mode_reports_by_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("ok"), "").unwrap();
    let (runner, mut events) = runner(
        dir.path(),
        "if [ -f ok ]; then exit 0; fi; echo 'tests failed' >&2; exit 1",
        RunMode::Wait,
    );

    runner.start().await.unwrap();
    assert!(matches!(next_event(&mut events).await, RuntimeEvent::Restarted));

    fs::remove_file(dir.path().join("ok")).unwrap();
    runner.start().await.unwrap();
    match next_event(&mut events).await {
        RuntimeEvent::Errored { source, text } => {
            assert_eq!(source, FailureSource::Run);
            assert_eq!(text, "tests failed\n");
        }
        other => panic!("expected Errored, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_build_carries_stderr_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("build.sh"), "echo \"main.go:7: undefined: x\" >&2\nexit 2\n").unwrap();
    let (builder, mut events) = builder(dir.path(), "sh build.sh -o tmp/relaunch-bin");

    builder.start().await.unwrap();
    match next_event(&mut events).await {
        RuntimeEvent::Errored { source, text } => {
            assert_eq!(source, FailureSource::Build);
            assert_eq!(text, "main.go:7: undefined: x\n");
        }
        other => panic!("expected Errored, got {other:?}"),
    }
    assert!(dir.path().join("tmp").is_dir());
}

#[tokio::test]
async fn superseded_build_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("build.sh"), "sleep 1\necho built >> out.txt\n").unwrap();
    let (builder, mut events) = builder(dir.path(), "sh build.sh");

    builder.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    builder.start().await.unwrap();

    assert!(matches!(next_event(&mut events).await, RuntimeEvent::Rebuilt));
    assert!(timeout(Duration::from_millis(1500), events.recv()).await.is_err());

    let out = fs::read_to_string(dir.path().join("out.txt")).unwrap();
    assert_eq!(out.lines().count(), 1);
}
