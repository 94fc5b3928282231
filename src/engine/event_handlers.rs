// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::path::Path;

use crate::engine::{Phase, RuntimeOptions};
use crate::types::FailureSource;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Ask the watcher whether anything changed.
    Scan,
    /// Start a build (replacing one in flight).
    Build,
    /// Start a new generation of the application.
    Run,
    /// Let waiting requests through to the app.
    Serve,
    /// Hold waiting requests.
    Pause,
    /// Answer waiting requests with 500 and this text.
    ShowError(String),
    /// Kill the build and the application.
    Stop,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Pause the proxy and kick off the first stage of a cycle.
pub fn start_cycle(phase: &mut Phase, options: &RuntimeOptions) -> CoreStep {
    *phase = Phase::Pending;
    let first = if options.build_enabled {
        CoreCommand::Build
    } else {
        CoreCommand::Run
    };
    CoreStep::continue_with(vec![CoreCommand::Pause, first])
}

/// A request arrived: find out whether it needs a new cycle first.
pub fn handle_request() -> CoreStep {
    CoreStep::continue_with(vec![CoreCommand::Scan])
}

pub fn handle_changed(phase: &mut Phase, options: &RuntimeOptions, path: &Path) -> CoreStep {
    tracing::debug!(path = %path.display(), "starting new cycle");
    start_cycle(phase, options)
}

/// Nothing changed. Only a settled, healthy cycle opens the gate; a pending
/// one settles the mode itself and a failed one keeps showing its error.
pub fn handle_unchanged(phase: Phase) -> CoreStep {
    match phase {
        Phase::Ready => CoreStep::continue_with(vec![CoreCommand::Serve]),
        Phase::Pending | Phase::Failed => CoreStep::continue_with(Vec::new()),
    }
}

/// The builder only reports the latest trigger, so a success always runs.
pub fn handle_rebuilt() -> CoreStep {
    CoreStep::continue_with(vec![CoreCommand::Run])
}

pub fn handle_restarted(phase: &mut Phase) -> CoreStep {
    *phase = Phase::Ready;
    CoreStep::continue_with(vec![CoreCommand::Serve])
}

pub fn handle_errored(phase: &mut Phase, source: FailureSource, text: String) -> CoreStep {
    tracing::debug!(%source, "cycle failed");
    *phase = Phase::Failed;
    CoreStep::continue_with(vec![CoreCommand::ShowError(text)])
}

pub fn handle_shutdown() -> CoreStep {
    CoreStep {
        commands: vec![CoreCommand::Stop],
        keep_running: false,
    }
}
