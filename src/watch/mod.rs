// src/watch/mod.rs

//! Change detection.
//!
//! This module is responsible for:
//! - Compiling the ignore list and extension filter (`filter.rs`).
//! - Walking the working tree on demand and comparing modification times
//!   against a monotonic checkpoint (`watcher.rs`).
//!
//! It does **not** know about builds or the proxy; it only answers "has
//! anything changed since the last scan?".

pub mod filter;
pub mod watcher;

pub use filter::WatchFilter;
pub use watcher::{scan_tree, ScanOutcome, Watcher};
