//! One-shot commands on a throwaway PTY.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel as channel;
use tracing::{debug, warn};

use crate::domain::TerminalSize;
use crate::infra::terminal::{PtyHandle, ReadEvent, ShellEnvironment, SpawnSpec};
use crate::usecases::ports::{CommandOutcome, CommandRequest, CommandRunner};

/// Runs `shell -l -c <command>` and collects everything it prints.
pub struct PtyCommandRunner {
    shell_env: Arc<ShellEnvironment>,
}

impl PtyCommandRunner {
    pub fn new(shell_env: Arc<ShellEnvironment>) -> Self {
        Self { shell_env }
    }
}

impl CommandRunner for PtyCommandRunner {
    #[tracing::instrument(skip(self, request), fields(cwd = %request.cwd.display(), timeout = ?request.timeout))]
    fn run(&self, request: CommandRequest<'_>) -> CommandOutcome {
        let args = vec![
            "-l".to_string(),
            "-c".to_string(),
            request.command.to_string(),
        ];
        let mut pty = match PtyHandle::spawn(SpawnSpec {
            program: self.shell_env.shell(),
            args: &args,
            cwd: request.cwd,
            env: self.shell_env.env(),
            size: TerminalSize::INITIAL,
        }) {
            Ok(pty) => pty,
            Err(e) => return CommandOutcome::SpawnFailed(e.to_string()),
        };
        let Some((read_rx, exit_rx)) = pty.take_events() else {
            return CommandOutcome::SpawnFailed("PTY event channels unavailable".to_string());
        };

        let deadline = Instant::now() + request.timeout;
        let timeout = channel::at(deadline);
        let mut output = Vec::new();
        let mut reading = true;
        let closed_reads = channel::never::<ReadEvent>();

        // Exactly one of exit, timeout or a broken waiter ends the loop.
        let exit_code = loop {
            let reads = if reading { &read_rx } else { &closed_reads };
            channel::select! {
                recv(reads) -> event => match event {
                    Ok(ReadEvent::Data(data)) => output.extend_from_slice(&data),
                    Ok(ReadEvent::Eof) | Ok(ReadEvent::Error(_)) | Err(_) => reading = false,
                },
                recv(exit_rx) -> code => break code.ok(),
                recv(timeout) -> _ => {
                    if let Err(e) = pty.kill() {
                        warn!(error = %e, "Failed to kill timed out command");
                    }
                    drain(&read_rx, &mut output);
                    debug!(bytes = output.len(), "Command timed out");
                    return CommandOutcome::TimedOut { output };
                }
            }
        };

        drain(&read_rx, &mut output);
        let exit_code = exit_code.unwrap_or(crate::infra::terminal::UNKNOWN_EXIT_CODE);
        debug!(exit_code, bytes = output.len(), "Command finished");
        CommandOutcome::Exited { output, exit_code }
    }
}

fn drain(read_rx: &channel::Receiver<ReadEvent>, output: &mut Vec<u8>) {
    while let Ok(event) = read_rx.recv_timeout(std::time::Duration::from_millis(50)) {
        match event {
            ReadEvent::Data(data) => output.extend_from_slice(&data),
            ReadEvent::Eof | ReadEvent::Error(_) => break,
        }
    }
}
