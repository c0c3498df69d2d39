//! Run-to-completion command execution with `cd` interception.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::{CommandResult, SessionId, parse_cd, resolve_cd_target};
use crate::usecases::ports::{CommandOutcome, CommandRequest, CommandRunner, DirectoryStore};

#[derive(Debug, Clone)]
pub struct ExecuteInput {
    pub command: String,
    pub session_id: Option<SessionId>,
}

pub trait ExecuteUseCase: Send + Sync {
    fn execute(&self, input: ExecuteInput) -> CommandResult;
}

pub struct ExecuteUseCaseImpl<C: CommandRunner, D: DirectoryStore> {
    runner: Arc<C>,
    directories: Arc<D>,
    home: PathBuf,
    timeout: Duration,
}

impl<C: CommandRunner, D: DirectoryStore> ExecuteUseCaseImpl<C, D> {
    pub fn new(runner: Arc<C>, directories: Arc<D>, home: PathBuf, timeout: Duration) -> Self {
        Self {
            runner,
            directories,
            home,
            timeout,
        }
    }

    fn change_directory(&self, session_id: Option<&SessionId>, target: &str, cwd: &str) -> CommandResult {
        let previous = session_id.and_then(|id| self.directories.previous(id));
        let resolved = resolve_cd_target(
            target,
            Path::new(cwd),
            previous.as_deref().map(Path::new),
            &self.home,
        );

        match std::fs::metadata(&resolved) {
            Ok(meta) if meta.is_dir() => {
                let new_cwd = resolved.to_string_lossy().into_owned();
                if let Some(id) = session_id {
                    self.directories.change(id, new_cwd.clone());
                }
                debug!(from = cwd, to = %new_cwd, "Tracked directory changed");
                CommandResult::changed_dir(new_cwd)
            }
            Ok(_) => CommandResult::cd_failed(format!("cd: not a directory: {}", target), cwd),
            Err(_) => CommandResult::cd_failed(
                format!("cd: no such file or directory: {}", target),
                cwd,
            ),
        }
    }
}

impl<C: CommandRunner, D: DirectoryStore> ExecuteUseCase for ExecuteUseCaseImpl<C, D> {
    #[tracing::instrument(skip(self, input), fields(session = ?input.session_id))]
    fn execute(&self, input: ExecuteInput) -> CommandResult {
        let session_id = input.session_id.as_ref();
        let cwd = session_id
            .and_then(|id| self.directories.current(id))
            .unwrap_or_else(|| self.home.to_string_lossy().into_owned());

        if let Some(target) = parse_cd(&input.command) {
            return self.change_directory(session_id, &target, &cwd);
        }

        if !Path::new(&cwd).is_dir() {
            return CommandResult::spawn_failed(
                format!("Working directory does not exist: {}", cwd),
                cwd,
            );
        }

        let outcome = self.runner.run(CommandRequest {
            command: &input.command,
            cwd: Path::new(&cwd),
            timeout: self.timeout,
        });

        match outcome {
            CommandOutcome::Exited { output, exit_code } => {
                CommandResult::completed(&String::from_utf8_lossy(&output), exit_code, cwd)
            }
            CommandOutcome::TimedOut { output } => CommandResult::timed_out(
                &String::from_utf8_lossy(&output),
                self.timeout.as_secs(),
                cwd,
            ),
            CommandOutcome::SpawnFailed(reason) => CommandResult::spawn_failed(reason, cwd),
        }
    }
}
