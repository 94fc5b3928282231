// src/config/validate.rs

use crate::config::model::{Config, RawConfig};
use crate::errors::{RelaunchError, Result};

impl TryFrom<RawConfig> for Config {
    type Error = RelaunchError;

    fn try_from(mut raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        normalise(&mut raw);
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw))
    }
}

/// Clean up user-provided lists: ignore entries lose whitespace and
/// trailing slashes, extensions lose whitespace. Empty entries are dropped.
fn normalise(raw: &mut RawConfig) {
    raw.watch.ignore = raw
        .watch
        .ignore
        .iter()
        .map(|dir| dir.trim().trim_end_matches('/').trim_start_matches("./").to_string())
        .filter(|dir| !dir.is_empty())
        .collect();

    raw.watch.extensions = raw
        .watch
        .extensions
        .iter()
        .map(|ext| ext.trim().to_string())
        .filter(|ext| !ext.is_empty() && ext != ".")
        .collect();

    raw.build.command = raw.build.command.trim().to_string();
}

fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    validate_proxy(cfg)?;
    validate_build(cfg)?;
    Ok(())
}

fn validate_proxy(cfg: &RawConfig) -> Result<()> {
    let proxy = &cfg.proxy;

    if proxy.app_port == 0 || proxy.proxy_port == 0 {
        return Err(RelaunchError::ConfigError(
            "[proxy].app_port and [proxy].proxy_port must be non-zero".to_string(),
        ));
    }

    if proxy.app_port == proxy.proxy_port && same_host(&proxy.host, &proxy.app_host) {
        return Err(RelaunchError::ConfigError(format!(
            "[proxy].app_port and [proxy].proxy_port are both {}; the proxy would forward to itself",
            proxy.app_port
        )));
    }

    if proxy.timeout == 0 {
        return Err(RelaunchError::ConfigError(
            "[proxy].timeout must be >= 1 (got 0)".to_string(),
        ));
    }

    if proxy.poll_interval_ms == 0 {
        return Err(RelaunchError::ConfigError(
            "[proxy].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_build(cfg: &RawConfig) -> Result<()> {
    if !cfg.build.enabled {
        return Ok(());
    }

    if cfg.build.command.is_empty() {
        return Err(RelaunchError::ConfigError(
            "[build].command must be set when [build].enabled = true".to_string(),
        ));
    }

    if cfg.build.bin_name.trim().is_empty() {
        return Err(RelaunchError::ConfigError(
            "[build].bin_name must be set when [build].enabled = true".to_string(),
        ));
    }

    Ok(())
}

fn same_host(a: &str, b: &str) -> bool {
    let loopback = |h: &str| matches!(h, "localhost" | "127.0.0.1" | "::1" | "[::1]");
    a == b || (loopback(a) && loopback(b))
}
