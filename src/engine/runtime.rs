// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::exec::ProcessBackend;
use crate::proxy::ProxyControl;
use crate::watch::{ScanOutcome, Watcher};

use super::core::CoreRuntime;
use super::{CoreCommand, RequestAck, RuntimeEvent};

/// Drives the change → build → run cycle in response to `RuntimeEvent`s,
/// and delegates process management to a `ProcessBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, scanning the tree, commanding the backend and flipping the
/// proxy mode.
pub struct Runtime<B: ProcessBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
    watcher: Watcher,
    proxy: ProxyControl,
    /// An event read while coalescing requests, handled next.
    deferred: Option<RuntimeEvent>,
}

impl<B: ProcessBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("watcher", &self.watcher)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend> Runtime<B> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        backend: B,
        watcher: Watcher,
        proxy: ProxyControl,
    ) -> Self {
        Self {
            core,
            event_rx,
            backend,
            watcher,
            proxy,
            deferred: None,
        }
    }

    /// Main event loop.
    ///
    /// - Starts the first cycle.
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (scan, build, run, mode).
    pub async fn run(mut self) -> Result<()> {
        info!(build_enabled = self.core.options().build_enabled, "relaunch runtime started");

        let boot = self.core.bootstrap();
        for command in boot.commands {
            if let Some(follow_up) = self.execute_command(command).await? {
                self.dispatch(follow_up).await?;
            }
        }

        loop {
            let event = match self.next_event().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; stopping processes");
                    self.backend.stop().await?;
                    break;
                }
            };

            let mut acks = Vec::new();
            let event = self.coalesce_requests(event, &mut acks);
            debug!(?event, waiting = acks.len(), "runtime received event");

            let outcome = self.dispatch(event).await;
            // Waiting requests resume once their scan has been acted on.
            for ack in acks {
                ack.fire();
            }

            // If the core says to stop, break out of the loop.
            if !outcome? {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    async fn next_event(&mut self) -> Option<RuntimeEvent> {
        match self.deferred.take() {
            Some(event) => Some(event),
            None => self.event_rx.recv().await,
        }
    }

    /// Fold queued `Requested` events into one: a single scan answers all
    /// of them. The first other event is kept for the next iteration.
    fn coalesce_requests(&mut self, event: RuntimeEvent, acks: &mut Vec<RequestAck>) -> RuntimeEvent {
        match event {
            RuntimeEvent::Requested(ack) => acks.extend(ack),
            other => return other,
        }

        while let Ok(next) = self.event_rx.try_recv() {
            match next {
                RuntimeEvent::Requested(ack) => acks.extend(ack),
                other => {
                    self.deferred = Some(other);
                    break;
                }
            }
        }

        RuntimeEvent::Requested(None)
    }

    /// Step the core with `event` and run its commands. Scan results are
    /// fed straight back in. Returns whether the loop should keep running.
    async fn dispatch(&mut self, event: RuntimeEvent) -> Result<bool> {
        let mut queue = VecDeque::from([event]);
        let mut keep_running = true;

        while let Some(event) = queue.pop_front() {
            let step = self.core.step(&event);
            for command in step.commands {
                if let Some(follow_up) = self.execute_command(command).await? {
                    queue.push_back(follow_up);
                }
            }
            keep_running &= step.keep_running;
        }

        Ok(keep_running)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<Option<RuntimeEvent>> {
        match command {
            CoreCommand::Scan => return self.scan().await.map(Some),
            CoreCommand::Build => self.backend.build().await?,
            CoreCommand::Run => self.backend.run().await?,
            CoreCommand::Serve => self.proxy.serve(),
            CoreCommand::Pause => self.proxy.pause(),
            CoreCommand::ShowError(text) => self.proxy.error(text),
            CoreCommand::Stop => self.backend.stop().await?,
        }
        Ok(None)
    }

    async fn scan(&mut self) -> Result<RuntimeEvent> {
        match self.watcher.scan().await {
            Ok(ScanOutcome::Changed(path)) => Ok(RuntimeEvent::Changed { path }),
            Ok(ScanOutcome::Unchanged) => Ok(RuntimeEvent::Unchanged),
            Err(e) => {
                error!(error = %e, "change detection failed; stopping");
                if let Err(stop_err) = self.backend.stop().await {
                    error!(error = %stop_err, "failed to stop processes");
                }
                Err(e)
            }
        }
    }
}

/// Requests a graceful stop of the runtime. Cloneable; calling `stop` more
/// than once, or after the runtime ended, does nothing.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl ShutdownHandle {
    pub fn new(tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { tx }
    }

    pub async fn stop(&self) {
        if self.tx.send(RuntimeEvent::ShutdownRequested).await.is_err() {
            debug!("shutdown requested but runtime already stopped");
        }
    }
}
