// src/config/mod.rs

//! Configuration loading and validation for relaunch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load / save a config file (`loader.rs`).
//! - Validate and normalise it (`validate.rs`).
//! - Apply `PORT` and CLI overrides (`overrides.rs`).
//! - Guess defaults for `relaunch init` (`detect.rs`).

pub mod detect;
pub mod loader;
pub mod model;
pub mod overrides;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, resolve_raw, save, DEFAULT_CONFIG_FILE};
pub use model::{BuildSection, Config, ProxySection, RawConfig, RunSection, WatchSection};
pub use overrides::Overrides;
