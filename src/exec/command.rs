// src/exec/command.rs

//! Command channel shared by the builder and runner loops.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::exec::process::{ManagedProcess, ProcessExit};

/// Commands a leaf supervisor loop understands.
#[derive(Debug)]
pub enum SupervisorCommand {
    /// Kill whatever is running, then start a fresh process.
    Start,
    /// Kill whatever is running; acknowledge once it is gone.
    Stop(oneshot::Sender<()>),
}

/// Handle used by the orchestrator to drive one leaf loop.
#[derive(Debug, Clone)]
pub struct LeafHandle {
    name: &'static str,
    tx: mpsc::Sender<SupervisorCommand>,
}

impl LeafHandle {
    pub(crate) fn new(name: &'static str, tx: mpsc::Sender<SupervisorCommand>) -> Self {
        Self { name, tx }
    }

    /// Ask the leaf to (re)start its process.
    pub async fn start(&self) -> Result<()> {
        self.tx
            .send(SupervisorCommand::Start)
            .await
            .map_err(|e| Error::msg(format!("{} loop is gone: {e}", self.name)))?;
        Ok(())
    }

    /// Ask the leaf to kill its process and wait at most `bound` for the ack.
    ///
    /// Safe to call any number of times, including after the loop ended.
    pub async fn stop(&self, bound: Duration) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(SupervisorCommand::Stop(ack_tx)).await.is_err() {
            debug!(leaf = self.name, "stop requested but loop already finished");
            return;
        }

        match timeout(bound, ack_rx).await {
            Ok(Ok(())) => debug!(leaf = self.name, "stop acknowledged"),
            Ok(Err(_)) => debug!(leaf = self.name, "loop exited before acknowledging stop"),
            Err(_) => warn!(
                leaf = self.name,
                ?bound,
                "stop not acknowledged in time"
            ),
        }
    }
}

/// Result of waiting on a process while still listening for commands.
#[derive(Debug)]
pub enum Waited {
    /// The process exited on its own (or was killed by someone else).
    Exited(ProcessExit),
    /// A command arrived first; the process has been terminated. `None`
    /// means the command channel closed.
    Preempted(Option<SupervisorCommand>),
}

/// Wait for `process` to exit unless a new command preempts it.
///
/// Preemption terminates the process group before returning, so the caller
/// can act on the command with nothing left running.
pub async fn wait_or_preempt(
    process: &mut ManagedProcess,
    rx: &mut mpsc::Receiver<SupervisorCommand>,
    grace: Duration,
) -> Waited {
    let next = tokio::select! {
        exit = process.wait() => return Waited::Exited(exit),
        next = rx.recv() => next,
    };

    debug!(cmd = process.command_line(), ?next, "preempting running process");
    process.terminate(grace).await;
    Waited::Preempted(next)
}
