// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the build and the
//! application, using `tokio::process::Command`, and reporting back to the
//! orchestration runtime via `RuntimeEvent`s.
//!
//! - [`process`] owns a single child: process group, stderr capture, kill.
//! - [`command`] is the command channel shared by the leaf loops.
//! - [`builder`] runs the optional build step (last trigger wins).
//! - [`runner`] supervises the application process.
//! - [`backend`] provides the `ProcessBackend` trait and the concrete
//!   `SupervisorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod builder;
pub mod command;
pub mod process;
pub mod runner;

pub use backend::{ProcessBackend, SupervisorBackend};
pub use command::{LeafHandle, SupervisorCommand};
pub use process::{CommandSpec, ExitClass, ManagedProcess, ProcessExit};
