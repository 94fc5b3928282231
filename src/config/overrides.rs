// src/config/overrides.rs

//! Values that win over the config file: the `PORT` environment variable
//! (for foreman-style launchers that assign ports) and CLI flags.

use tracing::{debug, warn};

use crate::cli::RunArgs;
use crate::config::model::RawConfig;

/// Overrides collected from the environment and the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Raw value of the `PORT` environment variable, if set.
    pub env_port: Option<String>,
    pub app_port: Option<u16>,
    pub proxy_port: Option<u16>,
    pub timeout: Option<u64>,
    pub ignore: Option<Vec<String>>,
    pub wait: bool,
}

impl Overrides {
    pub fn from_run_args(args: &RunArgs, env_port: Option<String>) -> Self {
        Self {
            env_port,
            app_port: args.app_port,
            proxy_port: args.proxy_port,
            timeout: args.timeout,
            ignore: args.ignore.clone(),
            wait: args.wait,
        }
    }

    /// Apply in priority order: config file < `PORT` < CLI flags.
    pub fn apply(&self, raw: &mut RawConfig) {
        if let Some(port) = self.env_port.as_deref() {
            match port.trim().parse::<u16>() {
                Ok(port) => {
                    debug!(port, "using PORT from environment as app port");
                    raw.proxy.app_port = port;
                }
                Err(e) => warn!(value = %port, error = %e, "ignoring unparsable PORT"),
            }
        }

        if let Some(port) = self.app_port {
            raw.proxy.app_port = port;
        }
        if let Some(port) = self.proxy_port {
            raw.proxy.proxy_port = port;
        }
        if let Some(timeout) = self.timeout {
            raw.proxy.timeout = timeout;
        }
        if let Some(ref ignore) = self.ignore {
            raw.watch.ignore = ignore.clone();
        }
        if self.wait {
            raw.run.wait = true;
        }
    }
}
