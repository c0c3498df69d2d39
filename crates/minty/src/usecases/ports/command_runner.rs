use std::path::Path;
use std::time::Duration;

pub struct CommandRequest<'a> {
    pub command: &'a str,
    pub cwd: &'a Path,
    pub timeout: Duration,
}

/// How a run-to-completion command ended. Exactly one is produced per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Exited { output: Vec<u8>, exit_code: i32 },
    TimedOut { output: Vec<u8> },
    SpawnFailed(String),
}

pub trait CommandRunner: Send + Sync {
    fn run(&self, request: CommandRequest<'_>) -> CommandOutcome;
}
