// src/exec/process.rs

//! A single supervised child process.
//!
//! `ManagedProcess` owns one spawned shell command running in its own
//! process group. The `Child` itself lives in a small waiter task that
//! publishes the exit through a `watch` channel, so any number of
//! observers (the owning leaf, a background exit monitor) can await it.
//! Stderr is captured into a shared buffer that survives until the next
//! trigger replaces the process.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStderr, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{RelaunchError, Result};

/// How long to wait for the stderr pipe to reach EOF after the process
/// exited. Grandchildren may keep the pipe open indefinitely.
const STDERR_SETTLE: Duration = Duration::from_millis(250);

/// What to spawn and how to treat its output.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Short label for logs ("build", "run").
    pub label: &'static str,
    /// Shell-interpreted command line.
    pub command_line: String,
    /// Copy stderr to our own stderr as it arrives (in addition to capturing).
    pub echo_stderr: bool,
    /// Working directory; inherits ours when `None`.
    pub workdir: Option<PathBuf>,
}

/// Exit of a managed process as observed by the waiter task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal or the status
    /// could not be collected.
    pub code: Option<i32>,
}

/// Classification of a process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Exit code 0.
    Clean,
    /// We killed it; whatever the status says, this is not a failure.
    Intentional,
    /// Died from a signal we did not send. Logged, not surfaced.
    Signaled,
    /// Non-zero exit code.
    Failed(i32),
}

impl ExitClass {
    pub fn is_failure(self) -> bool {
        matches!(self, ExitClass::Failed(_))
    }
}

/// Classify an exit given whether the supervisor requested the kill.
pub fn classify(exit: ProcessExit, killed_by_us: bool) -> ExitClass {
    if killed_by_us {
        return ExitClass::Intentional;
    }
    match exit.code {
        Some(0) => ExitClass::Clean,
        Some(code) => ExitClass::Failed(code),
        None => ExitClass::Signaled,
    }
}

/// Captured stderr of one process. Cheap to clone; clones share the buffer.
#[derive(Debug, Clone)]
pub struct StderrCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    done: watch::Receiver<bool>,
}

impl StderrCapture {
    fn empty() -> (Self, watch::Sender<bool>) {
        let (done_tx, done) = watch::channel(false);
        (
            Self {
                buf: Arc::new(Mutex::new(Vec::new())),
                done,
            },
            done_tx,
        )
    }

    /// Everything captured so far, lossily decoded.
    pub fn text(&self) -> String {
        let guard = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&guard).into_owned()
    }

    /// Wait (bounded) until the pipe reached EOF.
    pub async fn settle(&mut self, bound: Duration) {
        let _ = timeout(bound, self.done.wait_for(|done| *done)).await;
    }

    fn append(&self, chunk: &[u8]) {
        let mut guard = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        guard.extend_from_slice(chunk);
    }
}

/// A spawned shell command running in its own process group.
#[derive(Debug)]
pub struct ManagedProcess {
    label: &'static str,
    command_line: String,
    pid: Option<u32>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
    killed: Arc<AtomicBool>,
    /// Only used where process groups are unavailable.
    #[cfg_attr(unix, allow(dead_code))]
    kill_tx: mpsc::UnboundedSender<()>,
    stderr: StderrCapture,
}

impl ManagedProcess {
    /// Spawn `spec` through the platform shell.
    ///
    /// On Unix the child becomes the leader of a fresh process group so
    /// that everything it forks can be signalled together.
    pub fn spawn(spec: &CommandSpec) -> Result<Self> {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&spec.command_line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&spec.command_line);
            c
        };

        if let Some(dir) = spec.workdir.as_ref() {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| RelaunchError::SpawnError {
            cmd: spec.command_line.clone(),
            source,
        })?;

        let pid = child.id();
        info!(label = spec.label, pid = ?pid, cmd = %spec.command_line, "spawned process");

        let (stderr, done_tx) = StderrCapture::empty();
        if let Some(pipe) = child.stderr.take() {
            spawn_stderr_reader(spec, pipe, stderr.clone(), done_tx);
        } else {
            let _ = done_tx.send(true);
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();
        let label = spec.label;

        tokio::spawn(async move {
            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    Some(()) = kill_rx.recv() => {
                        if let Err(e) = child.start_kill() {
                            debug!(label, error = %e, "start_kill failed");
                        }
                    }
                }
            };

            let exit = match status {
                Ok(status) => ProcessExit { code: status.code() },
                Err(e) => {
                    warn!(label, error = %e, "failed to collect exit status");
                    ProcessExit { code: None }
                }
            };
            debug!(label, pid = ?pid, exit_code = ?exit.code, "process exited");
            let _ = exit_tx.send(Some(exit));
        });

        Ok(Self {
            label: spec.label,
            command_line: spec.command_line.clone(),
            pid,
            exit_rx,
            killed: Arc::new(AtomicBool::new(false)),
            kill_tx,
            stderr,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// The exit, if the process already terminated.
    pub fn try_exit(&self) -> Option<ProcessExit> {
        *self.exit_rx.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.try_exit().is_some()
    }

    /// Whether the supervisor has asked this process to die.
    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Shared flag set right before the supervisor signals the group.
    pub fn killed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.killed)
    }

    /// A receiver that resolves to the exit once it happens.
    pub fn exit_watch(&self) -> watch::Receiver<Option<ProcessExit>> {
        self.exit_rx.clone()
    }

    pub fn stderr(&self) -> StderrCapture {
        self.stderr.clone()
    }

    /// Wait for the process to exit, then give stderr a moment to drain.
    pub async fn wait(&mut self) -> ProcessExit {
        let exit = wait_for_exit(self.exit_rx.clone()).await;
        self.stderr.settle(STDERR_SETTLE).await;
        exit
    }

    /// Terminate the whole process group.
    ///
    /// SIGTERM first; if the leader is still alive after `grace`, SIGKILL.
    /// A final SIGKILL sweep removes stragglers that outlived the leader.
    /// Returns once the leader has been reaped. When the leader already
    /// exited on its own, only the sweep is sent: anything it left running
    /// in the group still dies.
    pub async fn terminate(&mut self, grace: Duration) {
        // Set before signalling so a pending exit report is suppressed.
        self.killed.store(true, Ordering::SeqCst);

        if self.has_exited() {
            debug!(label = self.label, pid = ?self.pid, "leader already exited; sweeping its group");
            self.signal_group(GroupSignal::Kill);
            return;
        }

        info!(label = self.label, pid = ?self.pid, "stopping process group");
        self.signal_group(GroupSignal::Term);

        if timeout(grace, wait_for_exit(self.exit_rx.clone())).await.is_err() {
            warn!(
                label = self.label,
                pid = ?self.pid,
                ?grace,
                "process group ignored SIGTERM; sending SIGKILL"
            );
            self.signal_group(GroupSignal::Kill);
            wait_for_exit(self.exit_rx.clone()).await;
        }

        self.signal_group(GroupSignal::Kill);
    }

    #[cfg(unix)]
    fn signal_group(&self, sig: GroupSignal) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return;
        };
        let Ok(raw) = i32::try_from(pid) else {
            return;
        };

        let signal = match sig {
            GroupSignal::Term => Signal::SIGTERM,
            GroupSignal::Kill => Signal::SIGKILL,
        };

        match killpg(Pid::from_raw(raw), signal) {
            Ok(()) => debug!(label = self.label, pgid = raw, ?signal, "signalled process group"),
            Err(Errno::ESRCH) => {}
            Err(e) => warn!(label = self.label, pgid = raw, ?signal, error = %e, "killpg failed"),
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self, sig: GroupSignal) {
        // No process groups: the direct child is all we can reach.
        let _ = sig;
        let _ = self.kill_tx.send(());
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Term,
    Kill,
}

/// Resolve once the watched process has exited.
pub async fn wait_for_exit(mut exit_rx: watch::Receiver<Option<ProcessExit>>) -> ProcessExit {
    match exit_rx.wait_for(|exit| exit.is_some()).await {
        Ok(exit) => (*exit).unwrap_or(ProcessExit { code: None }),
        // Waiter task is gone without publishing; nothing left to wait on.
        Err(_) => ProcessExit { code: None },
    }
}

fn spawn_stderr_reader(
    spec: &CommandSpec,
    mut pipe: ChildStderr,
    capture: StderrCapture,
    done_tx: watch::Sender<bool>,
) {
    let label = spec.label;
    let echo = spec.echo_stderr;

    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        let mut out = tokio::io::stderr();

        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    capture.append(&chunk[..n]);
                    if echo {
                        let _ = out.write_all(&chunk[..n]).await;
                    } else {
                        debug!(label, "stderr: {}", String::from_utf8_lossy(&chunk[..n]).trim_end());
                    }
                }
                Err(e) => {
                    debug!(label, error = %e, "stderr read failed");
                    break;
                }
            }
        }

        let _ = done_tx.send(true);
    });
}
