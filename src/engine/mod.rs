// src/engine/mod.rs

//! Orchestration engine for relaunch.
//!
//! This module ties together:
//! - the change detector (asked on every inbound request)
//! - the builder and runner (through a `ProcessBackend`)
//! - the proxy mode (the runtime owns the only `ProxyControl`)
//!
//! and reacts to:
//! - inbound requests
//! - scan results
//! - build / run outcomes
//! - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::fmt;
use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::types::FailureSource;

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Route changes through the builder before restarting the app.
    pub build_enabled: bool,
}

/// Where the core is in the change → build → run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A build or run is outstanding; its outcome will settle the mode.
    Pending,
    /// The app is up (or, in wait mode, last ran successfully).
    Ready,
    /// The last build or run failed; only a change retries.
    Failed,
}

/// Completion signal for a request waiting on its scan.
///
/// Fired by the runtime once the scan the request caused has been acted on.
pub struct RequestAck(oneshot::Sender<()>);

impl RequestAck {
    pub fn new(tx: oneshot::Sender<()>) -> Self {
        Self(tx)
    }

    pub fn fire(self) {
        // The request may already be gone.
        let _ = self.0.send(());
    }
}

impl fmt::Debug for RequestAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestAck")
    }
}

/// Events flowing into the runtime from the proxy, watcher and leaves.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// An inbound request arrived.
    Requested(Option<RequestAck>),
    /// A scan found a modified path.
    Changed { path: PathBuf },
    /// A scan found nothing new.
    Unchanged,
    /// The build succeeded.
    Rebuilt,
    /// The application is up (background) or finished cleanly (wait).
    Restarted,
    /// The build or the application failed.
    Errored { source: FailureSource, text: String },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::{Runtime, ShutdownHandle};
