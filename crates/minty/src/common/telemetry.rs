#![expect(clippy::print_stderr, reason = "Tracing not initialized yet")]

//! Tracing subscriber setup shared by the daemon and the client.

use std::io::IsTerminal;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_FILE_ENV: &str = "MINTY_LOG";
pub const LOG_FORMAT_ENV: &str = "MINTY_LOG_FORMAT";
pub const LOG_STREAM_ENV: &str = "MINTY_LOG_STREAM";

/// Keeps the non-blocking file writer flushing until dropped.
#[derive(Debug)]
pub struct TelemetryGuard {
    _guard: Option<WorkerGuard>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogStream {
    Stderr,
    Stdout,
}

pub fn init_tracing(default_level: &str) -> TelemetryGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (writer, guard, ansi) = build_writer();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(writer);

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match log_format_from_env() {
        LogFormat::Json => Box::new(builder.with_ansi(false).json().finish()),
        LogFormat::Text => Box::new(builder.with_thread_names(true).with_ansi(ansi).finish()),
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return TelemetryGuard { _guard: None };
    }

    TelemetryGuard { _guard: guard }
}

fn build_writer() -> (BoxMakeWriter, Option<WorkerGuard>, bool) {
    if let Some(path) = log_file_path_from_env() {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                return (BoxMakeWriter::new(non_blocking), Some(guard), false);
            }
            Err(err) => {
                eprintln!(
                    "Warning: failed to open log file {}: {}",
                    path.display(),
                    err
                );
            }
        }
    }

    match log_stream_from_env() {
        LogStream::Stdout => (
            BoxMakeWriter::new(std::io::stdout),
            None,
            std::io::stdout().is_terminal(),
        ),
        LogStream::Stderr => (
            BoxMakeWriter::new(std::io::stderr),
            None,
            std::io::stderr().is_terminal(),
        ),
    }
}

fn log_file_path_from_env() -> Option<PathBuf> {
    std::env::var(LOG_FILE_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn normalized_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_lowercase())
}

fn log_format_from_env() -> LogFormat {
    match normalized_env(LOG_FORMAT_ENV).as_deref() {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

fn log_stream_from_env() -> LogStream {
    match normalized_env(LOG_STREAM_ENV).as_deref() {
        Some("stdout") => LogStream::Stdout,
        _ => LogStream::Stderr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EnvGuard;

    #[test]
    fn test_log_format_parsing() {
        let _guard = EnvGuard::set(LOG_FORMAT_ENV, " JSON ");
        assert_eq!(log_format_from_env(), LogFormat::Json);

        let _guard = EnvGuard::set(LOG_FORMAT_ENV, "text");
        assert_eq!(log_format_from_env(), LogFormat::Text);
    }

    #[test]
    fn test_log_stream_parsing() {
        let _guard = EnvGuard::set(LOG_STREAM_ENV, "stdout");
        assert_eq!(log_stream_from_env(), LogStream::Stdout);

        let _guard = EnvGuard::remove(LOG_STREAM_ENV);
        assert_eq!(log_stream_from_env(), LogStream::Stderr);
    }

    #[test]
    fn test_blank_log_file_is_ignored() {
        let _guard = EnvGuard::set(LOG_FILE_ENV, "   ");
        assert!(log_file_path_from_env().is_none());
    }
}
