use std::fmt;

/// Which managed command produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    /// The build command exited non-zero (or could not be spawned).
    Build,
    /// The application command exited non-zero (or could not be spawned).
    Run,
}

impl fmt::Display for FailureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureSource::Build => f.write_str("build"),
            FailureSource::Run => f.write_str("run"),
        }
    }
}

/// How the runner delivers the outcome of a run.
///
/// - `Background`: report `Restarted` as soon as the process is up and watch
///   for an abnormal exit afterwards (web servers).
/// - `Wait`: block until the process exits and report based on its exit
///   code (scripts that run to completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Background,
    Wait,
}

impl RunMode {
    pub fn from_wait_flag(wait: bool) -> Self {
        if wait { RunMode::Wait } else { RunMode::Background }
    }
}
