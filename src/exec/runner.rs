// src/exec/runner.rs

//! Run loop: supervises the application process.
//!
//! Every command first terminates the current generation, so a new
//! process is never spawned while the previous one is alive.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::exec::command::{wait_or_preempt, LeafHandle, SupervisorCommand, Waited};
use crate::exec::process::{classify, wait_for_exit, CommandSpec, ExitClass, ManagedProcess};
use crate::types::{FailureSource, RunMode};

/// What the runner runs.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub command_line: String,
    pub mode: RunMode,
    /// Project root the application runs in.
    pub workdir: PathBuf,
    /// Time between SIGTERM and SIGKILL.
    pub grace: Duration,
}

/// Spawn the run loop; events go to `events`.
pub fn spawn_runner(spec: RunSpec, events: mpsc::Sender<RuntimeEvent>) -> LeafHandle {
    let (tx, rx) = mpsc::channel::<SupervisorCommand>(16);
    tokio::spawn(run_loop(spec, rx, events));
    LeafHandle::new("runner", tx)
}

async fn run_loop(
    spec: RunSpec,
    mut rx: mpsc::Receiver<SupervisorCommand>,
    events: mpsc::Sender<RuntimeEvent>,
) {
    info!(cmd = %spec.command_line, mode = ?spec.mode, "runner loop started");

    let mut current: Option<ManagedProcess> = None;
    let mut pending: Option<SupervisorCommand> = None;

    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match rx.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        if let Some(mut previous) = current.take() {
            previous.terminate(spec.grace).await;
        }

        match command {
            SupervisorCommand::Stop(ack) => {
                let _ = ack.send(());
            }
            SupervisorCommand::Start => {
                let mut process = match ManagedProcess::spawn(&CommandSpec {
                    label: "run",
                    command_line: spec.command_line.clone(),
                    echo_stderr: true,
                    workdir: Some(spec.workdir.clone()),
                }) {
                    Ok(process) => process,
                    Err(e) => {
                        warn!(error = %e, "application could not be spawned");
                        let event = RuntimeEvent::Errored {
                            source: FailureSource::Run,
                            text: e.to_string(),
                        };
                        if events.send(event).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let keep = match spec.mode {
                    RunMode::Wait => {
                        let keep =
                            run_to_completion(&mut process, &spec, &mut rx, &mut pending, &events).await;
                        // Kept so the next command sweeps whatever the
                        // command left behind in its group.
                        current = Some(process);
                        keep
                    }
                    RunMode::Background => {
                        // Restarted goes out before the monitor can report
                        // an early crash.
                        let sent = events.send(RuntimeEvent::Restarted).await.is_ok();
                        start_in_background(&process, &events);
                        current = Some(process);
                        sent
                    }
                };
                if !keep {
                    debug!("runtime gone; runner exiting");
                    break;
                }
            }
        }
    }

    if let Some(mut last) = current.take() {
        last.terminate(spec.grace).await;
    }
    info!("runner loop finished (channel closed)");
}

/// Wait mode: the outcome is decided by the exit code. Returns `false` once
/// the event channel is closed.
async fn run_to_completion(
    process: &mut ManagedProcess,
    spec: &RunSpec,
    rx: &mut mpsc::Receiver<SupervisorCommand>,
    pending: &mut Option<SupervisorCommand>,
    events: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    let event = match wait_or_preempt(process, rx, spec.grace).await {
        Waited::Preempted(next) => {
            debug!("run preempted while waiting for exit");
            *pending = next;
            return true;
        }
        Waited::Exited(exit) => match classify(exit, process.was_killed()) {
            ExitClass::Clean => {
                info!("command finished successfully");
                RuntimeEvent::Restarted
            }
            class => {
                warn!(exit_code = ?exit.code, ?class, "command failed");
                RuntimeEvent::Errored {
                    source: FailureSource::Run,
                    text: process.stderr().text(),
                }
            }
        },
    };
    events.send(event).await.is_ok()
}

/// Background mode: watch for an unexpected exit after `Restarted` has
/// already been reported.
fn start_in_background(process: &ManagedProcess, events: &mpsc::Sender<RuntimeEvent>) {
    let exit_rx = process.exit_watch();
    let killed = process.killed_flag();
    let mut stderr = process.stderr();
    let pid = process.pid();
    let events = events.clone();

    tokio::spawn(async move {
        let exit = wait_for_exit(exit_rx).await;
        match classify(exit, killed.load(Ordering::SeqCst)) {
            ExitClass::Intentional => debug!(pid = ?pid, "application stopped by supervisor"),
            ExitClass::Clean => info!(pid = ?pid, "application exited cleanly"),
            ExitClass::Signaled => warn!(pid = ?pid, "application killed by an external signal"),
            ExitClass::Failed(code) => {
                stderr.settle(Duration::from_millis(250)).await;
                // A kill may have raced the settle; a replaced generation
                // must not report.
                if killed.load(Ordering::SeqCst) {
                    return;
                }
                warn!(pid = ?pid, exit_code = code, "application exited with an error");
                let _ = events
                    .send(RuntimeEvent::Errored {
                        source: FailureSource::Run,
                        text: stderr.text(),
                    })
                    .await;
            }
        }
    });
}
