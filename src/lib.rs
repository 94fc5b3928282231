// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod proxy;
pub mod types;
pub mod watch;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, InitArgs, RunArgs};
use crate::config::detect::{config_for, detect_project};
use crate::config::{Config, Overrides};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, ShutdownHandle};
use crate::errors::RelaunchError;
use crate::exec::builder::shell_quote;
use crate::exec::SupervisorBackend;
use crate::proxy::{ProxyControl, ProxyServer};
use crate::watch::{WatchFilter, Watcher};

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Run(run) => run_supervisor(run).await,
        Command::Init(init) => init_config(&init),
        Command::Version => {
            println!("relaunch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// `relaunch run`.
///
/// This wires together:
/// - config loading and overrides
/// - the supervisor (proxy, backend, watcher, runtime)
/// - signal handling
async fn run_supervisor(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args, std::env::var("PORT").ok())?;
    let app_command = app_command(&args.command, &config)?;
    let root = std::env::current_dir().context("cannot determine working directory")?;
    info!(cmd = %app_command, root = %root.display(), "supervising");

    let supervisor = Supervisor::start(&config, app_command, root).await?;
    spawn_signal_listener(supervisor.shutdown_handle());
    supervisor.run().await?;
    Ok(())
}

/// A fully wired, not yet running supervisor.
#[derive(Debug)]
pub struct Supervisor {
    runtime: Runtime<SupervisorBackend>,
    server: ProxyServer,
    shutdown: ShutdownHandle,
}

impl Supervisor {
    /// Bind the proxy and spawn the builder / runner loops for `config`.
    ///
    /// The proxy is bound first, so a busy port fails before anything is
    /// spawned. Commands run in, and changes are detected under, `root`.
    pub async fn start(
        config: &Config,
        app_command: String,
        root: PathBuf,
    ) -> std::result::Result<Self, RelaunchError> {
        // Runtime event channel.
        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

        let (control, modes) = ProxyControl::new();
        let server = proxy::bind(&config.proxy, rt_tx.clone(), modes).await?;

        let backend = SupervisorBackend::new(config, app_command, &root, rt_tx.clone());
        let watcher = Watcher::new(root, WatchFilter::from_section(&config.watch));

        let core = CoreRuntime::new(RuntimeOptions {
            build_enabled: config.build.enabled,
        });

        Ok(Self {
            runtime: Runtime::new(core, rt_rx, backend, watcher, control),
            server,
            shutdown: ShutdownHandle::new(rt_tx),
        })
    }

    /// Address the proxy actually listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve until a shutdown is requested or change detection fails.
    pub async fn run(self) -> std::result::Result<(), RelaunchError> {
        let server_task = tokio::spawn(self.server.serve());
        let result = self.runtime.run().await;

        // In-flight requests are not awaited; each one is bounded by its timeout.
        server_task.abort();
        result
    }
}

/// Load the config file, apply `PORT` and CLI overrides, validate.
pub fn resolve_config(args: &RunArgs, env_port: Option<String>) -> Result<Config> {
    let mut raw = config::resolve_raw(args.config.as_deref())?;
    Overrides::from_run_args(args, env_port).apply(&mut raw);
    let config = Config::try_from(raw)?;
    debug!(?config, "configuration resolved");
    Ok(config)
}

/// The application command line: the trailing arguments, or the build
/// output when building is enabled and none were given.
pub fn app_command(command: &[String], config: &Config) -> std::result::Result<String, RelaunchError> {
    if !command.is_empty() {
        return Ok(command.join(" "));
    }
    if config.build.enabled {
        let output = config.build.output_path();
        // A bare relative name would be looked up on PATH.
        let output = if output.is_relative() && output.components().count() == 1 {
            Path::new(".").join(output)
        } else {
            output
        };
        return Ok(shell_quote(&output.to_string_lossy()));
    }
    Err(RelaunchError::ConfigError(
        "no command given and building is disabled; pass one after `--`".into(),
    ))
}

/// `relaunch init`.
fn init_config(args: &InitArgs) -> Result<()> {
    if args.config.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            args.config.display()
        );
    }

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let kind = detect_project(&cwd)?;
    let config = config_for(kind);
    config::save(&args.config, &config)?;

    info!(?kind, path = %args.config.display(), "wrote config");
    Ok(())
}

#[cfg(unix)]
fn spawn_signal_listener(shutdown: ShutdownHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let kinds = [
        ("SIGINT", SignalKind::interrupt()),
        ("SIGTERM", SignalKind::terminate()),
        ("SIGHUP", SignalKind::hangup()),
        ("SIGQUIT", SignalKind::quit()),
    ];

    for (name, kind) in kinds {
        let mut stream = match signal(kind) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(signal = name, error = %e, "failed to install signal handler");
                continue;
            }
        };
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                info!(signal = name, "received signal; shutting down");
                shutdown.stop().await;
            }
        });
    }
}

#[cfg(not(unix))]
fn spawn_signal_listener(shutdown: ShutdownHandle) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("received Ctrl+C; shutting down");
        shutdown.stop().await;
    });
}
