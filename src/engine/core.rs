// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state (the current [`Phase`])
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - running scans and talking to the builder / runner
//! - updating the proxy mode
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use crate::engine::event_handlers::{
    handle_changed, handle_errored, handle_rebuilt, handle_request, handle_restarted,
    handle_shutdown, handle_unchanged, start_cycle, CoreStep,
};
use crate::engine::{Phase, RuntimeEvent, RuntimeOptions};

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    phase: Phase,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            phase: Phase::Pending,
            options,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn options(&self) -> RuntimeOptions {
        self.options
    }

    /// Commands for startup: the first cycle runs without waiting for a
    /// request or a change.
    pub fn bootstrap(&mut self) -> CoreStep {
        start_cycle(&mut self.phase, &self.options)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: &RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::Requested(_) => handle_request(),
            RuntimeEvent::Changed { path } => handle_changed(&mut self.phase, &self.options, path),
            RuntimeEvent::Unchanged => handle_unchanged(self.phase),
            RuntimeEvent::Rebuilt => handle_rebuilt(),
            RuntimeEvent::Restarted => handle_restarted(&mut self.phase),
            RuntimeEvent::Errored { source, text } => {
                handle_errored(&mut self.phase, *source, text.clone())
            }
            RuntimeEvent::ShutdownRequested => handle_shutdown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::engine::CoreCommand;
    use crate::types::FailureSource;

    fn core(build_enabled: bool) -> CoreRuntime {
        CoreRuntime::new(RuntimeOptions { build_enabled })
    }

    fn changed() -> RuntimeEvent {
        RuntimeEvent::Changed {
            path: PathBuf::from("main.go"),
        }
    }

    #[test]
    fn bootstrap_pauses_then_builds_or_runs() {
        assert_eq!(
            core(true).bootstrap().commands,
            vec![CoreCommand::Pause, CoreCommand::Build]
        );
        assert_eq!(
            core(false).bootstrap().commands,
            vec![CoreCommand::Pause, CoreCommand::Run]
        );
    }

    #[test]
    fn build_success_leads_to_run_then_serve() {
        let mut core = core(true);
        core.bootstrap();

        assert_eq!(core.step(&RuntimeEvent::Rebuilt).commands, vec![CoreCommand::Run]);
        assert_eq!(core.phase(), Phase::Pending);
        assert_eq!(core.step(&RuntimeEvent::Restarted).commands, vec![CoreCommand::Serve]);
        assert_eq!(core.phase(), Phase::Ready);
    }

    #[test]
    fn unchanged_serves_only_when_ready() {
        let mut core = core(false);
        core.bootstrap();
        assert!(core.step(&RuntimeEvent::Unchanged).commands.is_empty());

        core.step(&RuntimeEvent::Restarted);
        assert_eq!(core.step(&RuntimeEvent::Unchanged).commands, vec![CoreCommand::Serve]);
    }

    #[test]
    fn failure_sticks_until_the_next_change() {
        let mut core = core(true);
        core.bootstrap();

        let step = core.step(&RuntimeEvent::Errored {
            source: FailureSource::Build,
            text: "syntax error".into(),
        });
        assert_eq!(step.commands, vec![CoreCommand::ShowError("syntax error".into())]);
        assert!(core.step(&RuntimeEvent::Unchanged).commands.is_empty());

        assert_eq!(
            core.step(&changed()).commands,
            vec![CoreCommand::Pause, CoreCommand::Build]
        );
        assert_eq!(core.phase(), Phase::Pending);
    }

    #[test]
    fn request_always_scans() {
        let mut core = core(false);
        assert_eq!(core.step(&RuntimeEvent::Requested(None)).commands, vec![CoreCommand::Scan]);
    }

    #[test]
    fn shutdown_stops_and_exits() {
        let mut core = core(false);
        let step = core.step(&RuntimeEvent::ShutdownRequested);
        assert_eq!(step.commands, vec![CoreCommand::Stop]);
        assert!(!step.keep_running);
    }
}
