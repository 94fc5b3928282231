// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `relaunch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "relaunch",
    version,
    about = "Live reload utility + proxy.",
    long_about = "Serves your application through a proxy. Whenever the proxy receives an \
                  HTTP request and the filesystem has changed, the app is rebuilt (optionally) \
                  and restarted before the request is answered."
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `--debug`, `RELAUNCH_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print debug output (shorthand for `--log-level debug`).
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Reload your application as you make changes to source files.
    Run(RunArgs),
    /// Write a configuration file with defaults guessed from the project.
    Init(InitArgs),
    /// Print the version number.
    Version,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `relaunch.toml` in the current working directory. A missing
    /// default file is fine; a missing explicit file is an error.
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Port your application runs on; `PORT` in the environment wins over
    /// the config file, this flag wins over both.
    #[arg(long, short = 'a', value_name = "PORT")]
    pub app_port: Option<u16>,

    /// Port the proxy listens on.
    #[arg(long, short = 'p', value_name = "PORT")]
    pub proxy_port: Option<u16>,

    /// Timeout for proxied requests, in seconds.
    #[arg(long, short = 't', value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Comma separated list of directories to ignore file changes in.
    #[arg(long, short = 'x', value_delimiter = ',', value_name = "DIR")]
    pub ignore: Option<Vec<String>>,

    /// Wait for the command to finish before proxying a request.
    #[arg(long)]
    pub wait: bool,

    /// The command that runs your application.
    ///
    /// Defaults to the build output binary when building is enabled.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Where to write the config file.
    #[arg(long, short = 'c', value_name = "PATH", default_value = "relaunch.toml")]
    pub config: PathBuf,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_collects_trailing_command() {
        let args = CliArgs::try_parse_from([
            "relaunch", "run", "-a", "3001", "-x", "tmp/, vendor", "--", "ruby", "app.rb", "-p",
            "3001",
        ])
        .unwrap();

        let Command::Run(run) = args.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(run.app_port, Some(3001));
        assert_eq!(run.ignore.unwrap(), vec!["tmp/".to_string(), " vendor".to_string()]);
        assert_eq!(run.command, vec!["ruby", "app.rb", "-p", "3001"]);
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let args = CliArgs::try_parse_from(["relaunch", "init", "--debug", "--force"]).unwrap();
        assert!(args.debug);
        let Command::Init(init) = args.command else {
            panic!("expected init subcommand");
        };
        assert!(init.force);
        assert_eq!(init.config, PathBuf::from("relaunch.toml"));
    }

    #[test]
    fn version_is_a_subcommand() {
        let args = CliArgs::try_parse_from(["relaunch", "version"]).unwrap();
        assert!(matches!(args.command, Command::Version));
    }
}
