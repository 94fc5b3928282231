// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The runtime talks to a `ProcessBackend` instead of the builder and
//! runner loops directly. This makes it easy to swap in a fake backend in
//! tests while keeping the production implementation in [`builder`] and
//! [`runner`].
//!
//! - `SupervisorBackend` is the default implementation used by `relaunch`.
//!   It owns the handles of both leaf loops and forwards commands to them.
//! - Tests can provide their own `ProcessBackend` that records what was
//!   requested and emits `Rebuilt` / `Restarted` / `Errored` directly.
//!
//! [`builder`]: crate::exec::builder
//! [`runner`]: crate::exec::runner

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::Config;
use crate::engine::RuntimeEvent;
use crate::errors::{RelaunchError, Result};
use crate::exec::builder::{spawn_builder, BuildSpec};
use crate::exec::command::LeafHandle;
use crate::exec::runner::{spawn_runner, RunSpec};

/// How long `stop` waits for each leaf to acknowledge, on top of the kill
/// grace period.
const STOP_ACK_SLACK: Duration = Duration::from_secs(1);

/// Trait abstracting how build and run requests are carried out.
///
/// Production code uses [`SupervisorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ProcessBackend: Send {
    /// Start a build, replacing one still in flight.
    fn build(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Start the application, replacing the running generation.
    fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Kill everything. Must be idempotent and safe with nothing running.
    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real backend used in production: one builder loop (when the build is
/// enabled) and one runner loop.
#[derive(Debug)]
pub struct SupervisorBackend {
    builder: Option<LeafHandle>,
    runner: LeafHandle,
    stop_bound: Duration,
}

impl SupervisorBackend {
    /// Spawn the leaf loops for `config`, wiring them to the runtime event
    /// sender. `app_command` is the shell command line of the application;
    /// both commands run in `workdir`.
    pub fn new(
        config: &Config,
        app_command: String,
        workdir: &Path,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        let grace = config.run.kill_grace();

        let builder = config.build.enabled.then(|| {
            spawn_builder(BuildSpec::from_section(&config.build, workdir, grace), events.clone())
        });

        let runner = spawn_runner(
            RunSpec {
                command_line: app_command,
                mode: config.run.mode(),
                workdir: workdir.to_path_buf(),
                grace,
            },
            events,
        );

        Self {
            builder,
            runner,
            stop_bound: grace + STOP_ACK_SLACK,
        }
    }
}

impl ProcessBackend for SupervisorBackend {
    fn build(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let builder = self
                .builder
                .as_ref()
                .ok_or_else(|| RelaunchError::ConfigError("build requested but build is disabled".into()))?;
            builder.start().await
        })
    }

    fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.runner.start().await })
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            debug!("stopping builder and runner");
            if let Some(builder) = self.builder.as_ref() {
                builder.stop(self.stop_bound).await;
            }
            self.runner.stop(self.stop_bound).await;
            Ok(())
        })
    }
}
