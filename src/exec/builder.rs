// src/exec/builder.rs

//! Build loop: compiles the project into the configured output path.
//!
//! Each `Start` kills a build still running from an earlier trigger before
//! spawning a new one, so the most recent trigger always wins and at most
//! one build process is alive. A preempted build reports nothing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::BuildSection;
use crate::engine::RuntimeEvent;
use crate::exec::command::{wait_or_preempt, LeafHandle, SupervisorCommand, Waited};
use crate::exec::process::{classify, CommandSpec, ExitClass, ManagedProcess};
use crate::types::FailureSource;

/// What the builder runs.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    /// Full command line, output flag included.
    pub command_line: String,
    /// Directory the binary is written into; created before each build.
    pub target_dir: PathBuf,
    /// Project root the build runs in.
    pub workdir: PathBuf,
    pub grace: Duration,
}

impl BuildSpec {
    pub fn from_section(build: &BuildSection, workdir: &Path, grace: Duration) -> Self {
        Self {
            command_line: build_command_line(&build.command, &build.output_path()),
            target_dir: workdir.join(&build.target_path),
            workdir: workdir.to_path_buf(),
            grace,
        }
    }
}

/// `<command> -o <output>` with the output path shell-quoted.
pub fn build_command_line(command: &str, output: &Path) -> String {
    format!("{} -o {}", command.trim(), shell_quote(&output.to_string_lossy()))
}

/// Quote `s` for `sh` when it contains anything but plain path characters.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '+' | '='));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Spawn the build loop; events go to `events`.
pub fn spawn_builder(spec: BuildSpec, events: mpsc::Sender<RuntimeEvent>) -> LeafHandle {
    let (tx, rx) = mpsc::channel::<SupervisorCommand>(16);
    tokio::spawn(build_loop(spec, rx, events));
    LeafHandle::new("builder", tx)
}

async fn build_loop(
    spec: BuildSpec,
    mut rx: mpsc::Receiver<SupervisorCommand>,
    events: mpsc::Sender<RuntimeEvent>,
) {
    info!(cmd = %spec.command_line, "builder loop started");
    let mut pending: Option<SupervisorCommand> = None;

    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match rx.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            SupervisorCommand::Stop(ack) => {
                // Builds are awaited inline; nothing can be running here.
                let _ = ack.send(());
            }
            SupervisorCommand::Start => {
                let Some(event) = run_build(&spec, &mut rx, &mut pending).await else {
                    continue;
                };
                if events.send(event).await.is_err() {
                    debug!("runtime gone; builder exiting");
                    break;
                }
            }
        }
    }

    info!("builder loop finished (channel closed)");
}

/// Run one build. `None` when it was preempted; `pending` then holds the
/// command that preempted it.
async fn run_build(
    spec: &BuildSpec,
    rx: &mut mpsc::Receiver<SupervisorCommand>,
    pending: &mut Option<SupervisorCommand>,
) -> Option<RuntimeEvent> {
    if let Err(e) = tokio::fs::create_dir_all(&spec.target_dir).await {
        warn!(dir = %spec.target_dir.display(), error = %e, "cannot create build output directory");
    }

    let command = CommandSpec {
        label: "build",
        command_line: spec.command_line.clone(),
        echo_stderr: false,
        workdir: Some(spec.workdir.clone()),
    };

    let mut process = match ManagedProcess::spawn(&command) {
        Ok(process) => process,
        Err(e) => {
            warn!(error = %e, "build command could not be spawned");
            return Some(RuntimeEvent::Errored {
                source: FailureSource::Build,
                text: e.to_string(),
            });
        }
    };

    let event = match wait_or_preempt(&mut process, rx, spec.grace).await {
        Waited::Preempted(next) => {
            debug!("build preempted");
            *pending = next;
            return None;
        }
        Waited::Exited(exit) => match classify(exit, process.was_killed()) {
            ExitClass::Clean => {
                info!("build succeeded");
                RuntimeEvent::Rebuilt
            }
            class => {
                let text = process.stderr().text();
                warn!(exit_code = ?exit.code, ?class, "build failed");
                RuntimeEvent::Errored {
                    source: FailureSource::Build,
                    text,
                }
            }
        },
    };

    // Nothing the build forked may outlive it.
    process.terminate(spec.grace).await;
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_flag_is_appended() {
        let line = build_command_line("go build", Path::new("tmp/relaunch-bin"));
        assert_eq!(line, "go build -o tmp/relaunch-bin");
    }

    #[test]
    fn awkward_paths_are_quoted() {
        assert_eq!(shell_quote("my dir/bin"), "'my dir/bin'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
