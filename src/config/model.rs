// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::RunMode;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// extensions = [".go"]
/// ignore = ["node_modules", "tmp", "log", "vendor"]
///
/// [build]
/// enabled = true
/// command = "go build"
/// target_path = "tmp"
/// bin_name = "relaunch-bin"
///
/// [proxy]
/// app_port = 3000
/// proxy_port = 4000
/// timeout = 10
///
/// [run]
/// wait = false
/// ```
///
/// All sections are optional and have reasonable defaults. This is the
/// unchecked form; [`Config`] is what the rest of the crate consumes.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RawConfig {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub proxy: ProxySection,

    #[serde(default)]
    pub run: RunSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WatchSection {
    /// Only files with one of these extensions count as changes. Empty
    /// means every file counts.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Directory names (or root-relative paths) whose subtrees are skipped.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_ignore() -> Vec<String> {
    ["node_modules", "log", "tmp", "vendor"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            ignore: default_ignore(),
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BuildSection {
    #[serde(default)]
    pub enabled: bool,

    /// Build command line; `-o <target_path>/<bin_name>` is appended.
    #[serde(default)]
    pub command: String,

    #[serde(default = "default_target_path")]
    pub target_path: PathBuf,

    #[serde(default = "default_bin_name")]
    pub bin_name: String,
}

fn default_target_path() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_bin_name() -> String {
    "relaunch-bin".to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            enabled: false,
            command: String::new(),
            target_path: default_target_path(),
            bin_name: default_bin_name(),
        }
    }
}

impl BuildSection {
    /// Path of the binary the build command produces.
    pub fn output_path(&self) -> PathBuf {
        self.target_path.join(&self.bin_name)
    }
}

/// `[proxy]` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxySection {
    /// Interface the proxy binds.
    #[serde(default = "default_host")]
    pub host: String,

    /// Host the application listens on.
    #[serde(default = "default_app_host")]
    pub app_host: String,

    #[serde(default = "default_app_port")]
    pub app_port: u16,

    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,

    /// Seconds a request may wait for the app before a 502 is returned.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// How often a waiting request re-checks the proxy mode.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_app_host() -> String {
    "localhost".to_string()
}

fn default_app_port() -> u16 {
    3000
}

fn default_proxy_port() -> u16 {
    4000
}

fn default_timeout() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            host: default_host(),
            app_host: default_app_host(),
            app_port: default_app_port(),
            proxy_port: default_proxy_port(),
            timeout: default_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ProxySection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RunSection {
    /// Wait for the command to exit before serving requests.
    #[serde(default)]
    pub wait: bool,

    /// Milliseconds between SIGTERM and SIGKILL when stopping a process
    /// group.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_kill_grace_ms() -> u64 {
    2000
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            wait: false,
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

impl RunSection {
    pub fn mode(&self) -> RunMode {
        RunMode::from_wait_flag(self.wait)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// Validated configuration, immutable for the lifetime of one run.
///
/// Built from [`RawConfig`] via `TryFrom` (see `validate.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub watch: WatchSection,
    pub build: BuildSection,
    pub proxy: ProxySection,
    pub run: RunSection,
}

impl Config {
    pub(crate) fn new_unchecked(raw: RawConfig) -> Self {
        Self {
            watch: raw.watch,
            build: raw.build,
            proxy: raw.proxy,
            run: raw.run,
        }
    }

    /// Back to the serializable form (used by `relaunch init`).
    pub fn to_raw(&self) -> RawConfig {
        RawConfig {
            watch: self.watch.clone(),
            build: self.build.clone(),
            proxy: self.proxy.clone(),
            run: self.run.clone(),
        }
    }
}
