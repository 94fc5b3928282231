// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! Build and run failures of the managed commands are *not* errors here:
//! they travel as `RuntimeEvent::Errored` and end up in the proxy's error
//! mode. This type covers what the supervisor itself cannot recover from.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelaunchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// The proxy could not bind its listening socket.
    #[error("cannot listen on {addr}: {source}")]
    ListenError {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem traversal failed; change detection cannot continue.
    #[error("watcher failure: {0}")]
    WatchError(String),

    #[error("failed to spawn `{cmd}`: {source}")]
    SpawnError {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RelaunchError>;
