use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use relaunch::engine::RuntimeEvent;
use relaunch::errors::Result;
use relaunch::exec::ProcessBackend;
use relaunch::types::FailureSource;
use tokio::sync::mpsc;

/// What the runtime asked the backend to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Build,
    Run,
    Stop,
}

/// Scripted outcome of one build or run. `Err` carries the stderr text.
pub type Outcome = std::result::Result<(), String>;

/// A fake backend that:
/// - records which calls were made
/// - immediately reports `Rebuilt` / `Restarted`, or `Errored` when the
///   next scripted outcome says so (success once the script runs out).
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    calls: Arc<Mutex<Vec<BackendCall>>>,
    build_outcomes: VecDeque<Outcome>,
    run_outcomes: VecDeque<Outcome>,
}

impl FakeBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, calls: Arc<Mutex<Vec<BackendCall>>>) -> Self {
        Self {
            runtime_tx,
            calls,
            build_outcomes: VecDeque::new(),
            run_outcomes: VecDeque::new(),
        }
    }

    pub fn with_build_outcomes(mut self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.build_outcomes.extend(outcomes);
        self
    }

    pub fn with_run_outcomes(mut self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.run_outcomes.extend(outcomes);
        self
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn report(
        &mut self,
        call: BackendCall,
        source: FailureSource,
        success: RuntimeEvent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.record(call);
        let outcome = match source {
            FailureSource::Build => self.build_outcomes.pop_front(),
            FailureSource::Run => self.run_outcomes.pop_front(),
        };
        let event = match outcome.unwrap_or(Ok(())) {
            Ok(()) => success,
            Err(text) => RuntimeEvent::Errored { source, text },
        };
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            tx.send(event).await.map_err(anyhow::Error::from)?;
            Ok(())
        })
    }
}

impl ProcessBackend for FakeBackend {
    fn build(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.report(BackendCall::Build, FailureSource::Build, RuntimeEvent::Rebuilt)
    }

    fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.report(BackendCall::Run, FailureSource::Run, RuntimeEvent::Restarted)
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.record(BackendCall::Stop);
        Box::pin(async { Ok(()) })
    }
}
