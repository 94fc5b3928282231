#![allow(dead_code)]

use relaunch::config::{Config, RawConfig};

/// Builder for `Config` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawConfig::default();
        // Keep tests snappy.
        config.proxy.poll_interval_ms = 20;
        config.run.kill_grace_ms = 500;
        Self { config }
    }

    pub fn with_build(mut self, command: &str) -> Self {
        self.config.build.enabled = true;
        self.config.build.command = command.to_string();
        self
    }

    pub fn with_target(mut self, target_path: &str, bin_name: &str) -> Self {
        self.config.build.target_path = target_path.into();
        self.config.build.bin_name = bin_name.to_string();
        self
    }

    pub fn with_ports(mut self, app_port: u16, proxy_port: u16) -> Self {
        self.config.proxy.app_port = app_port;
        self.config.proxy.proxy_port = proxy_port;
        self
    }

    pub fn with_app_host(mut self, host: &str) -> Self {
        self.config.proxy.app_host = host.to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.config.proxy.timeout = secs;
        self
    }

    pub fn with_extension(mut self, ext: &str) -> Self {
        self.config.watch.extensions.push(ext.to_string());
        self
    }

    pub fn with_ignore(mut self, dir: &str) -> Self {
        self.config.watch.ignore.push(dir.to_string());
        self
    }

    pub fn with_wait(mut self, wait: bool) -> Self {
        self.config.run.wait = wait;
        self
    }

    pub fn with_kill_grace_ms(mut self, ms: u64) -> Self {
        self.config.run.kill_grace_ms = ms;
        self
    }

    pub fn raw(self) -> RawConfig {
        self.config
    }

    pub fn build(self) -> Config {
        Config::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
