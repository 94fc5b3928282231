// src/proxy/mod.rs

//! Reverse proxy that hides restarts from the client.
//!
//! - [`mode`] holds the `Serving` / `Paused` / `Errored` state and the
//!   orchestrator's write handle.
//! - [`forward`] performs one attempt against the application.
//! - [`server`] accepts connections and runs the per-request retry loop.

pub mod forward;
pub mod mode;
pub mod server;

pub use forward::{Forwarded, Forwarder};
pub use mode::{ModeReader, ProxyControl, ProxyMode};
pub use server::{bind, ProxyServer, TIMEOUT_BODY};
