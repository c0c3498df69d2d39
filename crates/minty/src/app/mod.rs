#![expect(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "top-level CLI output and error reporting"
)]

use clap::CommandFactory;
use clap::Parser;
use clap_complete::generate;
use tracing::debug;

pub mod attach;
pub mod commands;
pub mod daemon;
pub mod error;
pub mod handlers;

use crate::app::attach::AttachError;
use crate::app::commands::{Cli, Commands, DaemonCommand, OutputFormat};
use crate::app::error::{CliError, DaemonNotRunningError, exit_code_for_client_error, exit_codes};
use crate::app::handlers::HandlerContext;
use crate::common::telemetry;
use crate::common::{Colors, DaemonError, color_init};
use crate::infra::indexer::IndexError;
use crate::infra::ipc::{ClientError, DaemonClient, UnixSocketClient, ensure_daemon};

const PROGRAM_NAME: &str = "minty";

pub struct Application;

impl Application {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self) -> i32 {
        let cli = Cli::parse();
        color_init(cli.no_color);
        let format = cli.effective_format();

        // The daemon installs its own subscriber with a different default level.
        if matches!(cli.command, Commands::Daemon(DaemonCommand::Start { foreground: true })) {
            return match daemon::start_daemon() {
                Ok(()) => exit_codes::SUCCESS,
                Err(e) => self.handle_error(self.wrap_error(e.into(), format)),
            };
        }

        let _telemetry = telemetry::init_tracing(if cli.verbose { "debug" } else { "warn" });
        debug!(command = ?cli.command, format = ?format, "CLI command parsed");

        match self.execute(&cli) {
            Ok(code) => code,
            Err(e) => self.handle_error(self.wrap_error(e, format)),
        }
    }

    fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        if let Some(code) = self.handle_standalone_commands(cli)? {
            return Ok(code);
        }

        let mut client = ensure_daemon()?;
        let mut ctx = HandlerContext::new(&mut client, cli.effective_format());
        self.dispatch_command(&mut ctx, &cli.command)
    }

    /// Commands that run without a connected client.
    fn handle_standalone_commands(&self, cli: &Cli) -> anyhow::Result<Option<i32>> {
        let format = cli.effective_format();
        match &cli.command {
            Commands::Daemon(DaemonCommand::Start { foreground: false }) => {
                if UnixSocketClient::is_daemon_running() {
                    println!("Daemon is already running");
                } else {
                    crate::infra::ipc::start_daemon_background()?;
                    println!("{}", Colors::success("Daemon started in background"));
                }
            }
            Commands::Daemon(DaemonCommand::Start { foreground: true }) => {
                daemon::start_daemon()?;
            }
            Commands::Daemon(DaemonCommand::Status) => self.handle_daemon_status(format)?,
            Commands::Daemon(DaemonCommand::Stop { force }) => {
                let result = handlers::stop_daemon_core(*force)?;
                handlers::print_stop_result(&result, format);
            }
            Commands::Completions { shell } => {
                let mut cmd = Cli::command();
                generate(*shell, &mut cmd, PROGRAM_NAME, &mut std::io::stdout());
            }
            Commands::Index { dir } => handlers::handle_index(dir, format)?,
            _ => return Ok(None),
        }
        Ok(Some(exit_codes::SUCCESS))
    }

    fn handle_daemon_status(&self, format: OutputFormat) -> anyhow::Result<()> {
        let health = UnixSocketClient::connect().and_then(|mut client| client.call("health", None));
        match health {
            Ok(result) => {
                handlers::print_daemon_status(&result, format);
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "Daemon health check failed");
                handlers::print_daemon_not_running(format);
                Err(DaemonNotRunningError.into())
            }
        }
    }

    fn dispatch_command<C: DaemonClient>(
        &self,
        ctx: &mut HandlerContext<C>,
        command: &Commands,
    ) -> anyhow::Result<i32> {
        match command {
            Commands::Daemon(_) | Commands::Completions { .. } | Commands::Index { .. } => {
                unreachable!("Handled in standalone")
            }

            Commands::New { cwd, id, title } => {
                let cwd = cwd
                    .as_deref()
                    .map(std::path::absolute)
                    .transpose()?
                    .map(|p| p.to_string_lossy().into_owned());
                handlers::handle_new(ctx, cwd, id.clone(), title.clone())?
            }
            Commands::Kill { session_id } => handlers::handle_kill(ctx, session_id)?,
            Commands::Send {
                session_id,
                text,
                no_newline,
            } => handlers::handle_send(ctx, session_id, text, *no_newline)?,
            Commands::Signal { session_id, kind } => {
                handlers::handle_signal(ctx, session_id, *kind)?
            }
            Commands::Resize {
                session_id,
                cols,
                rows,
            } => handlers::handle_resize(ctx, session_id, *cols, *rows)?,
            Commands::Sessions => handlers::handle_sessions(ctx)?,
            Commands::Exec { session, command } => {
                return handlers::handle_exec(ctx, session.clone(), command);
            }
            Commands::Pwd { session_id, set } => handlers::handle_pwd(ctx, session_id, set.clone())?,
            Commands::ListCommands { check } => {
                return handlers::handle_commands(ctx, check.clone());
            }
            Commands::Sysinfo => handlers::handle_sysinfo(ctx)?,
            Commands::Watch { window } => handlers::handle_watch(ctx, window.clone())?,
            Commands::Attach { session_id } => attach::attach(ctx.client, session_id)?,
        }
        Ok(exit_codes::SUCCESS)
    }

    fn handle_error(&self, e: anyhow::Error) -> i32 {
        // Status output is already printed; only the LSB code is left.
        if e.downcast_ref::<DaemonNotRunningError>().is_some() {
            return exit_codes::NOT_RUNNING;
        }

        if let Some(cli_error) = e.downcast_ref::<CliError>() {
            print_cli_error(cli_error);
            return cli_error.exit_code;
        }

        eprintln!("{}: {} {:#}", PROGRAM_NAME, Colors::error("Error:"), e);
        let (suggestion, retryable, code) = if let Some(client_error) = e.downcast_ref::<ClientError>()
        {
            (
                client_error.suggestion().map(String::from),
                client_error.is_retryable(),
                exit_code_for_client_error(client_error),
            )
        } else if let Some(attach_error) = e.downcast_ref::<AttachError>() {
            (
                Some(attach_error.suggestion().to_string()),
                attach_error.is_retryable(),
                attach_error.exit_code(),
            )
        } else if let Some(daemon_error) = e.downcast_ref::<DaemonError>() {
            (
                Some(daemon_error.suggestion()),
                daemon_error.is_retryable(),
                exit_codes::IOERR,
            )
        } else if let Some(index_error) = e.downcast_ref::<IndexError>() {
            (None, false, index_exit_code(index_error))
        } else {
            (None, false, exit_codes::GENERAL_ERROR)
        };

        if let Some(suggestion) = suggestion {
            eprintln!("{} {}", Colors::dim("Suggestion:"), suggestion);
        }
        if retryable {
            eprintln!("{}", Colors::dim("(This error may be transient; a retry may succeed)"));
        }
        code
    }

    /// In JSON mode every error becomes a structured object on stderr.
    fn wrap_error(&self, error: anyhow::Error, format: OutputFormat) -> anyhow::Error {
        if format != OutputFormat::Json
            || error.downcast_ref::<DaemonNotRunningError>().is_some()
            || error.downcast_ref::<CliError>().is_some()
        {
            return error;
        }

        let message = format!("{error:#}");
        let (json, exit_code) = if let Some(client_error) = error.downcast_ref::<ClientError>() {
            (Some(client_error.to_json()), exit_code_for_client_error(client_error))
        } else if let Some(attach_error) = error.downcast_ref::<AttachError>() {
            (Some(attach_error.to_json()), attach_error.exit_code())
        } else if let Some(index_error) = error.downcast_ref::<IndexError>() {
            (None, index_exit_code(index_error))
        } else if error.downcast_ref::<DaemonError>().is_some() {
            (None, exit_codes::IOERR)
        } else {
            (None, exit_codes::GENERAL_ERROR)
        };
        CliError::new(format, message, json, exit_code).into()
    }
}

fn index_exit_code(error: &IndexError) -> i32 {
    match error {
        IndexError::NotFound(_) | IndexError::NotADirectory(_) => exit_codes::USAGE,
        _ => exit_codes::IOERR,
    }
}

fn print_cli_error(error: &CliError) {
    match error.format {
        OutputFormat::Json => {
            let body = error
                .json
                .clone()
                .unwrap_or_else(|| serde_json::json!({ "success": false, "error": error.message }));
            eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        }
        OutputFormat::Text => {
            eprintln!("{}: {} {}", PROGRAM_NAME, Colors::error("Error:"), error.message);
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}
