use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use clap::ValueHint;
pub use clap_complete::Shell;
use std::path::PathBuf;

const AFTER_LONG_HELP: &str = r#"EXAMPLES:
    # Open a shell session and drive it
    minty new --cwd ~/src/app --id work
    minty send work "cargo test"
    minty attach work

    # Run a one-off command in the session's directory
    minty exec --session work git status

    # Follow everything the daemon pushes
    minty watch

    # Check daemon status
    minty daemon status"#;

#[derive(Parser)]
#[command(name = "minty")]
#[command(author, version, propagate_version = true)]
#[command(about = "Terminal session multiplexer daemon and client")]
#[command(after_long_help = AFTER_LONG_HELP)]
#[command(subcommand_required = true, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short,
        long,
        global = true,
        value_enum,
        value_name = "FORMAT",
        default_value_t = OutputFormat::Text
    )]
    pub format: OutputFormat,

    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage the background daemon
    #[command(subcommand)]
    Daemon(DaemonCommand),

    /// Open a new shell session
    #[command(after_long_help = "\
EXAMPLES:
    minty new
    minty new --cwd /srv/app --title api
    minty new --id build")]
    New {
        #[arg(short = 'd', long, value_name = "DIR", value_hint = ValueHint::DirPath)]
        cwd: Option<PathBuf>,

        #[arg(long, value_name = "ID")]
        id: Option<String>,

        #[arg(long)]
        title: Option<String>,
    },

    /// Terminate a session
    Kill {
        #[arg(value_name = "SESSION")]
        session_id: String,
    },

    /// Write text to a session, followed by Enter unless --no-newline
    Send {
        #[arg(value_name = "SESSION")]
        session_id: String,

        text: String,

        #[arg(long)]
        no_newline: bool,
    },

    /// Deliver an interrupt, suspend or end-of-input to a session
    Signal {
        #[arg(value_name = "SESSION")]
        session_id: String,

        #[arg(value_enum)]
        kind: SignalArg,
    },

    /// Change a session's terminal size
    Resize {
        #[arg(value_name = "SESSION")]
        session_id: String,

        cols: u16,

        rows: u16,
    },

    /// List live sessions
    Sessions,

    /// Run a command to completion and print its output
    #[command(long_about = "\
Run a command to completion in a session's tracked directory.

`cd DIR` is not run at all; it moves the session's tracked directory.
The exit status of this command mirrors the command's exit code.")]
    Exec {
        #[arg(short, long, value_name = "SESSION")]
        session: Option<String>,

        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "COMMAND"
        )]
        command: Vec<String>,
    },

    /// Show or change a session's tracked directory
    Pwd {
        #[arg(value_name = "SESSION")]
        session_id: String,

        #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
        set: Option<String>,
    },

    /// List executables on the daemon's PATH
    #[command(name = "commands")]
    ListCommands {
        #[arg(long, value_name = "NAME")]
        check: Option<String>,
    },

    /// Show host information
    Sysinfo,

    /// Print push events as JSON lines
    Watch {
        #[arg(long, value_name = "WINDOW")]
        window: Option<String>,
    },

    /// Attach the terminal to a session (Ctrl+\ detaches)
    Attach {
        #[arg(value_name = "SESSION")]
        session_id: String,
    },

    /// Write .minty and codebase.md for a directory
    Index {
        #[arg(value_name = "DIR", default_value = ".", value_hint = ValueHint::DirPath)]
        dir: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum, value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
#[command(subcommand_required = true, arg_required_else_help = true)]
pub enum DaemonCommand {
    /// Start the daemon process
    #[command(long_about = "\
Start the daemon process.

By default, starts the daemon in the background. Use --foreground to run
in the current terminal (useful for debugging).")]
    Start {
        #[arg(long)]
        foreground: bool,
    },

    /// Stop the running daemon
    #[command(long_about = "\
Stop the running daemon.

Asks the daemon to shut down over its socket, which terminates every
session. --force sends SIGTERM to the PID in the lock file instead.")]
    Stop {
        #[arg(long)]
        force: bool,
    },

    /// Show daemon status
    #[command(long_about = "\
Show whether the daemon is running, its PID, uptime and session count.

EXIT CODES:
    0 - Daemon is running and healthy
    3 - Daemon is not running")]
    Status,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum SignalArg {
    #[value(name = "SIGINT", alias = "int")]
    Sigint,
    #[value(name = "SIGTSTP", alias = "tstp")]
    Sigtstp,
    #[value(name = "EOF", alias = "eof")]
    Eof,
}

impl SignalArg {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalArg::Sigint => "SIGINT",
            SignalArg::Sigtstp => "SIGTSTP",
            SignalArg::Eof => "EOF",
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["minty", "sessions"]);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Sessions));
    }

    #[test]
    fn test_json_flag_wins() {
        let cli = Cli::parse_from(["minty", "--json", "sysinfo"]);
        assert_eq!(cli.effective_format(), OutputFormat::Json);
        let cli = Cli::parse_from(["minty", "sysinfo", "--format", "json"]);
        assert_eq!(cli.effective_format(), OutputFormat::Json);
    }

    #[test]
    fn test_exec_keeps_hyphenated_args() {
        let cli = Cli::parse_from(["minty", "exec", "--session", "t1", "ls", "-la", "/tmp"]);
        let Commands::Exec { session, command } = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(session.as_deref(), Some("t1"));
        assert_eq!(command, vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn test_signal_names() {
        let cli = Cli::parse_from(["minty", "signal", "t1", "SIGTSTP"]);
        let Commands::Signal { kind, .. } = cli.command else {
            panic!("expected signal");
        };
        assert_eq!(kind.as_str(), "SIGTSTP");
        assert!(Cli::try_parse_from(["minty", "signal", "t1", "SIGHUP"]).is_err());
    }

    #[test]
    fn test_index_defaults_to_current_dir() {
        let cli = Cli::parse_from(["minty", "index"]);
        let Commands::Index { dir } = cli.command else {
            panic!("expected index");
        };
        assert_eq!(dir, PathBuf::from("."));
    }

    #[test]
    fn test_daemon_requires_subcommand() {
        assert!(Cli::try_parse_from(["minty", "daemon"]).is_err());
        let cli = Cli::parse_from(["minty", "daemon", "stop", "--force"]);
        assert!(matches!(
            cli.command,
            Commands::Daemon(DaemonCommand::Stop { force: true })
        ));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
