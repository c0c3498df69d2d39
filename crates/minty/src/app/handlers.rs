#![expect(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "CLI handlers render command output"
)]

use std::path::Path;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::bail;
use serde_json::Value;
use serde_json::json;
use tracing::debug;
use tracing::warn;

use crate::app::commands::OutputFormat;
use crate::app::commands::SignalArg;
use crate::common::Colors;
use crate::infra::daemon::lock_holder_pid;
use crate::infra::daemon::remove_lock_file;
use crate::infra::indexer::IndexReport;
use crate::infra::indexer::SkipReason;
use crate::infra::indexer::index_directory;
use crate::infra::ipc::ClientError;
use crate::infra::ipc::DaemonClient;
use crate::infra::ipc::UnixSocketClient;
use crate::infra::ipc::lock_path;
use crate::infra::ipc::socket_path;

pub type HandlerResult = anyhow::Result<()>;

const STOP_TIMEOUT: Duration = Duration::from_secs(8);
const STOP_POLL: Duration = Duration::from_millis(50);

trait ValueExt {
    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str;
    fn bool_or(&self, key: &str, default: bool) -> bool;
    fn u64_or(&self, key: &str, default: u64) -> u64;
}

impl ValueExt for Value {
    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    fn u64_or(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(Value::as_u64).unwrap_or(default)
    }
}

fn format_uptime_ms(uptime_ms: u64) -> String {
    let secs = uptime_ms / 1000;
    let mins = secs / 60;
    let hours = mins / 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, mins % 60, secs % 60)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

pub struct HandlerContext<'a, C: DaemonClient> {
    pub client: &'a mut C,
    pub format: OutputFormat,
}

impl<'a, C: DaemonClient> HandlerContext<'a, C> {
    pub fn new(client: &'a mut C, format: OutputFormat) -> Self {
        Self { client, format }
    }

    fn output_json_or<F: FnOnce()>(&self, result: &Value, text_fn: F) {
        match self.format {
            OutputFormat::Json => print_json(result),
            OutputFormat::Text => text_fn(),
        }
    }

    /// Session operations report failure as `{success:false, error}`.
    fn call_checked(&mut self, method: &str, params: Value, action: &str) -> anyhow::Result<Value> {
        let result = self.client.call(method, Some(params))?;
        if !result.bool_or("success", true) {
            bail!("{action} failed: {}", result.str_or("error", "unknown error"));
        }
        Ok(result)
    }
}

pub fn handle_new<C: DaemonClient>(
    ctx: &mut HandlerContext<C>,
    cwd: Option<String>,
    id: Option<String>,
    title: Option<String>,
) -> HandlerResult {
    let params = json!({ "session": id, "cwd": cwd, "title": title });
    let result = ctx.call_checked("session_create", params, "Session create")?;
    ctx.output_json_or(&result, || {
        let pid = result
            .get("pid")
            .and_then(Value::as_u64)
            .map(|pid| format!(" (pid {pid})"))
            .unwrap_or_default();
        println!(
            "Session {} started in {}{}",
            Colors::id(result.str_or("session_id", "?")),
            result.str_or("cwd", "?"),
            Colors::dim(&pid)
        );
    });
    Ok(())
}

pub fn handle_kill<C: DaemonClient>(ctx: &mut HandlerContext<C>, session_id: &str) -> HandlerResult {
    let result = ctx
        .client
        .call("session_remove", Some(json!({ "session": session_id })))?;
    ctx.output_json_or(&json!({ "success": true, "session_id": session_id }), || {
        println!("Session {} removed", Colors::id(session_id));
    });
    debug!(session_id, ?result, "Session removed");
    Ok(())
}

pub fn handle_send<C: DaemonClient>(
    ctx: &mut HandlerContext<C>,
    session_id: &str,
    text: &str,
    no_newline: bool,
) -> HandlerResult {
    let (method, params) = if no_newline {
        ("session_write", json!({ "session": session_id, "data": text }))
    } else {
        ("session_write_line", json!({ "session": session_id, "command": text }))
    };
    let result = ctx.call_checked(method, params, "Write")?;
    ctx.output_json_or(&result, || {});
    Ok(())
}

pub fn handle_signal<C: DaemonClient>(
    ctx: &mut HandlerContext<C>,
    session_id: &str,
    kind: SignalArg,
) -> HandlerResult {
    let params = json!({ "session": session_id, "signal": kind.as_str() });
    let result = ctx.call_checked("session_signal", params, "Signal")?;
    ctx.output_json_or(&result, || {
        println!("Sent {} to {}", kind.as_str(), Colors::id(session_id));
    });
    Ok(())
}

pub fn handle_resize<C: DaemonClient>(
    ctx: &mut HandlerContext<C>,
    session_id: &str,
    cols: u16,
    rows: u16,
) -> HandlerResult {
    let params = json!({ "session": session_id, "cols": cols, "rows": rows });
    let result = ctx.call_checked("session_resize", params, "Resize")?;
    ctx.output_json_or(&result, || {
        println!("Session {} resized to {}x{}", Colors::id(session_id), cols, rows);
    });
    Ok(())
}

pub fn handle_sessions<C: DaemonClient>(ctx: &mut HandlerContext<C>) -> HandlerResult {
    let result = ctx.client.call("sessions", None)?;
    ctx.output_json_or(&result, || {
        let sessions = result
            .get("sessions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if sessions.is_empty() {
            println!("{}", Colors::dim("No sessions"));
            return;
        }
        for session in sessions {
            let pid = session
                .get("pid")
                .and_then(Value::as_u64)
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string());
            let state = if session.bool_or("running", false) {
                Colors::success("running")
            } else {
                Colors::dim("exited")
            };
            println!(
                "{:<12} {:<8} {:<7} {:<16} {}",
                Colors::id(session.str_or("id", "?")),
                pid,
                state,
                session.str_or("title", ""),
                session.str_or("cwd", "")
            );
        }
    });
    Ok(())
}

/// Multiple words are re-quoted so the shell sees the original argv; a
/// single word is passed as-is so pipelines can be given as one string.
fn join_command(command: &[String]) -> String {
    match command {
        [single] => single.clone(),
        words => shell_words::join(words),
    }
}

/// Runs a one-shot command and returns the exit status to mirror.
pub fn handle_exec<C: DaemonClient>(
    ctx: &mut HandlerContext<C>,
    session: Option<String>,
    command: &[String],
) -> anyhow::Result<i32> {
    let command = join_command(command);
    let result = ctx
        .client
        .call("execute", Some(json!({ "command": command, "session": session })))?;

    let success = result.bool_or("success", false);
    let exit_code = result
        .get("exitCode")
        .and_then(Value::as_i64)
        .and_then(|code| i32::try_from(code).ok())
        .unwrap_or(if success { 0 } else { 1 });

    ctx.output_json_or(&result, || {
        let output = result.str_or("output", "");
        if !output.is_empty() {
            println!("{output}");
        }
        let error = result.str_or("error", "");
        if !error.is_empty() {
            eprintln!("{}", Colors::error(error));
        }
    });
    Ok(exit_code)
}

pub fn handle_pwd<C: DaemonClient>(
    ctx: &mut HandlerContext<C>,
    session_id: &str,
    set: Option<String>,
) -> HandlerResult {
    let result = match set {
        Some(dir) => ctx
            .client
            .call("cwd_set", Some(json!({ "session": session_id, "cwd": dir })))?,
        None => ctx
            .client
            .call("cwd_get", Some(json!({ "session": session_id })))?,
    };
    ctx.output_json_or(&result, || println!("{}", result.str_or("cwd", "")));
    Ok(())
}

/// Lists commands on PATH, or with `check` reports one and returns 1 when
/// it is missing.
pub fn handle_commands<C: DaemonClient>(
    ctx: &mut HandlerContext<C>,
    check: Option<String>,
) -> anyhow::Result<i32> {
    let Some(name) = check else {
        let result = ctx.client.call("commands_list", None)?;
        ctx.output_json_or(&result, || {
            for command in result
                .get("commands")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
            {
                println!("{command}");
            }
        });
        return Ok(0);
    };

    let result = ctx
        .client
        .call("command_exists", Some(json!({ "name": name })))?;
    let exists = result.bool_or("exists", false);
    ctx.output_json_or(&result, || match result.get("path").and_then(Value::as_str) {
        Some(path) if exists => println!("{path}"),
        _ => eprintln!("{} not found", Colors::bold(&name)),
    });
    Ok(if exists { 0 } else { 1 })
}

pub fn handle_sysinfo<C: DaemonClient>(ctx: &mut HandlerContext<C>) -> HandlerResult {
    let result = ctx.client.call("system_info", None)?;
    ctx.output_json_or(&result, || {
        for (label, key) in [
            ("Platform", "platform"),
            ("Arch", "arch"),
            ("Hostname", "hostname"),
            ("User", "username"),
            ("Shell", "shell"),
            ("Home", "homeDir"),
            ("Temp", "tempDir"),
        ] {
            println!("{:<10} {}", Colors::dim(label), result.str_or(key, ""));
        }
    });
    Ok(())
}

/// Prints every stream frame as one JSON line until the window closes.
pub fn handle_watch<C: DaemonClient>(
    ctx: &mut HandlerContext<C>,
    window: Option<String>,
) -> HandlerResult {
    let params = window.map(|window| json!({ "window": window }));
    let mut stream = ctx.client.call_stream("subscribe", params)?;
    while let Some(frame) = stream.next_result()? {
        println!("{frame}");
        if frame.str_or("event", "") == "closed" {
            break;
        }
    }
    Ok(())
}

pub fn print_daemon_status(result: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&json!({
            "running": true,
            "status": result.str_or("status", "unknown"),
            "pid": result.u64_or("pid", 0),
            "uptime_ms": result.u64_or("uptime_ms", 0),
            "session_count": result.u64_or("session_count", 0),
            "window_count": result.u64_or("window_count", 0),
            "version": result.str_or("version", "unknown"),
        })),
        OutputFormat::Text => {
            println!(
                "{} Daemon is running ({})",
                Colors::success("●"),
                result.str_or("status", "unknown")
            );
            println!("  PID:      {}", result.u64_or("pid", 0));
            println!("  Uptime:   {}", format_uptime_ms(result.u64_or("uptime_ms", 0)));
            println!("  Sessions: {}", result.u64_or("session_count", 0));
            println!("  Windows:  {}", result.u64_or("window_count", 0));
            println!("  Version:  {}", result.str_or("version", "unknown"));
        }
    }
}

pub fn print_daemon_not_running(format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&json!({ "running": false })),
        OutputFormat::Text => println!("{} Daemon is not running", Colors::dim("○")),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StopResult {
    Stopped { pid: Option<u32>, warnings: Vec<String> },
    AlreadyStopped,
}

fn wait_until_stopped(socket: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !socket.exists() || !UnixSocketClient::is_daemon_running() {
            return true;
        }
        std::thread::sleep(STOP_POLL);
    }
    false
}

fn send_signal(pid: u32, signal: libc::c_int) -> Result<bool, ClientError> {
    let raw = libc::pid_t::try_from(pid).map_err(|_| ClientError::SignalFailed {
        pid,
        source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
    })?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(raw, signal) } == 0 {
        return Ok(true);
    }
    let source = std::io::Error::last_os_error();
    if source.raw_os_error() == Some(libc::ESRCH) {
        return Ok(false);
    }
    Err(ClientError::SignalFailed { pid, source })
}

/// Stops the daemon: the `shutdown` RPC first, SIGTERM when that fails or
/// `force` is set, then SIGKILL and sidecar cleanup as a last resort.
pub fn stop_daemon_core(force: bool) -> Result<StopResult, ClientError> {
    let socket = socket_path();
    let lock = lock_path(&socket);
    let pid = lock_holder_pid(&lock);
    if pid.is_none() && !UnixSocketClient::is_daemon_running() {
        return Ok(StopResult::AlreadyStopped);
    }

    let mut warnings = Vec::new();
    if !force {
        if let Ok(mut client) = UnixSocketClient::connect() {
            match client.call("shutdown", None) {
                Ok(_) if wait_until_stopped(&socket, STOP_TIMEOUT) => {
                    return Ok(StopResult::Stopped { pid, warnings });
                }
                Ok(_) => warnings.push("Daemon did not exit after shutdown request".to_string()),
                Err(e) => {
                    debug!(error = %e, "Shutdown RPC failed; falling back to SIGTERM");
                }
            }
        }
    }

    let Some(pid) = pid else {
        return Err(ClientError::UnexpectedResponse {
            message: format!("daemon PID unknown (no lock file at {})", lock.display()),
        });
    };
    if !send_signal(pid, libc::SIGTERM)? {
        warnings.push(format!("Process {pid} was already gone; removed stale files"));
        cleanup_sidecars(&socket, &lock);
        return Ok(StopResult::Stopped { pid: Some(pid), warnings });
    }
    if wait_until_stopped(&socket, STOP_TIMEOUT) {
        return Ok(StopResult::Stopped { pid: Some(pid), warnings });
    }

    warn!(pid, "Daemon ignored SIGTERM; sending SIGKILL");
    send_signal(pid, libc::SIGKILL)?;
    cleanup_sidecars(&socket, &lock);
    warnings.push(format!("Process {pid} was killed with SIGKILL"));
    Ok(StopResult::Stopped { pid: Some(pid), warnings })
}

fn cleanup_sidecars(socket: &Path, lock: &Path) {
    if socket.exists() {
        let _ = std::fs::remove_file(socket);
    }
    remove_lock_file(lock);
}

pub fn print_stop_result(result: &StopResult, format: OutputFormat) {
    match (format, result) {
        (OutputFormat::Json, StopResult::Stopped { pid, warnings }) => {
            print_json(&json!({ "stopped": true, "pid": pid, "warnings": warnings }));
        }
        (OutputFormat::Json, StopResult::AlreadyStopped) => {
            print_json(&json!({ "stopped": false, "already_stopped": true }));
        }
        (OutputFormat::Text, StopResult::Stopped { warnings, .. }) => {
            for warning in warnings {
                eprintln!("{}", Colors::warning(warning));
            }
            println!("{}", Colors::success("Daemon stopped"));
        }
        (OutputFormat::Text, StopResult::AlreadyStopped) => {
            println!("Daemon is not running (already stopped)");
        }
    }
}

fn skip_reason(reason: &SkipReason) -> String {
    match reason {
        SkipReason::TooLarge => "too large".to_string(),
        SkipReason::Binary => "binary".to_string(),
        SkipReason::Unreadable(e) => format!("unreadable: {e}"),
    }
}

fn index_report_json(report: &IndexReport) -> Value {
    let skipped: Vec<Value> = report
        .skipped
        .iter()
        .map(|(path, reason)| json!({ "path": path, "reason": skip_reason(reason) }))
        .collect();
    json!({
        "success": true,
        "root": report.root,
        "projectId": report.project_id,
        "totalFiles": report.total_files,
        "totalTokens": report.total_tokens,
        "manifest": report.manifest_path,
        "markdown": report.markdown_path,
        "skipped": skipped,
    })
}

/// Runs in-process; the daemon's `index_run` shells out to this command.
pub fn handle_index(dir: &Path, format: OutputFormat) -> HandlerResult {
    let report =
        index_directory(dir).with_context(|| format!("Indexing {} failed", dir.display()))?;
    match format {
        OutputFormat::Json => print_json(&index_report_json(&report)),
        OutputFormat::Text => {
            println!(
                "Indexed {} files (~{} tokens) in {}",
                report.total_files,
                report.total_tokens,
                report.root.display()
            );
            println!("  manifest: {}", report.manifest_path.display());
            println!("  markdown: {}", report.markdown_path.display());
            if !report.skipped.is_empty() {
                println!("  skipped:  {}", report.skipped.len());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error_codes;
    use crate::infra::ipc::MockClient;
    use tempfile::TempDir;

    #[test]
    fn test_join_command_keeps_single_string() {
        assert_eq!(join_command(&["ls -la | wc -l".to_string()]), "ls -la | wc -l");
        assert_eq!(
            join_command(&["echo".to_string(), "a b".to_string()]),
            "echo 'a b'"
        );
    }

    #[test]
    fn test_exec_mirrors_exit_code() {
        let mut client = MockClient::new().respond(
            "execute",
            json!({"success": false, "output": "", "error": "boom", "cwd": "/", "exitCode": 3}),
        );
        let mut ctx = HandlerContext::new(&mut client, OutputFormat::Json);
        let code = handle_exec(&mut ctx, Some("t1".into()), &["false".to_string()]).unwrap();
        assert_eq!(code, 3);
        assert_eq!(
            client.last_params("execute").unwrap(),
            json!({"command": "false", "session": "t1"})
        );
    }

    #[test]
    fn test_exec_without_exit_code_uses_success() {
        let mut client = MockClient::new().respond(
            "execute",
            json!({"success": false, "output": "", "error": "cd: no such file or directory: /nope", "cwd": "/"}),
        );
        let mut ctx = HandlerContext::new(&mut client, OutputFormat::Json);
        assert_eq!(handle_exec(&mut ctx, None, &["cd /nope".to_string()]).unwrap(), 1);
    }

    #[test]
    fn test_send_picks_method_by_newline() {
        let mut client = MockClient::new();
        let mut ctx = HandlerContext::new(&mut client, OutputFormat::Json);
        handle_send(&mut ctx, "t1", "ls", false).unwrap();
        handle_send(&mut ctx, "t1", "q", true).unwrap();
        assert_eq!(
            client.last_params("session_write_line").unwrap(),
            json!({"session": "t1", "command": "ls"})
        );
        assert_eq!(
            client.last_params("session_write").unwrap(),
            json!({"session": "t1", "data": "q"})
        );
    }

    #[test]
    fn test_failed_session_operation_is_an_error() {
        let mut client = MockClient::new().respond(
            "session_write_line",
            json!({"success": false, "error": "no active session"}),
        );
        let mut ctx = HandlerContext::new(&mut client, OutputFormat::Text);
        let err = handle_send(&mut ctx, "gone", "ls", false).unwrap_err();
        assert_eq!(err.to_string(), "Write failed: no active session");
    }

    #[test]
    fn test_signal_sends_wire_name() {
        let mut client = MockClient::new();
        let mut ctx = HandlerContext::new(&mut client, OutputFormat::Json);
        handle_signal(&mut ctx, "t1", SignalArg::Sigtstp).unwrap();
        assert_eq!(client.last_params("session_signal").unwrap()["signal"], "SIGTSTP");
    }

    #[test]
    fn test_commands_check_exit_status() {
        let mut client = MockClient::new()
            .respond("command_exists", json!({"exists": false, "path": null}));
        let mut ctx = HandlerContext::new(&mut client, OutputFormat::Json);
        assert_eq!(handle_commands(&mut ctx, Some("nope".into())).unwrap(), 1);

        let mut client = MockClient::new()
            .respond("command_exists", json!({"exists": true, "path": "/bin/sh"}));
        let mut ctx = HandlerContext::new(&mut client, OutputFormat::Json);
        assert_eq!(handle_commands(&mut ctx, Some("sh".into())).unwrap(), 0);
    }

    #[test]
    fn test_rpc_error_propagates_as_client_error() {
        let mut client =
            MockClient::new().fail("cwd_get", error_codes::INVALID_PARAMS, "Missing 'session' param");
        let mut ctx = HandlerContext::new(&mut client, OutputFormat::Text);
        let err = handle_pwd(&mut ctx, "", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::RpcError { code, .. }) if *code == error_codes::INVALID_PARAMS
        ));
    }

    #[test]
    fn test_pwd_set_uses_cwd_set() {
        let mut client = MockClient::new().respond("cwd_set", json!({"cwd": "/srv"}));
        let mut ctx = HandlerContext::new(&mut client, OutputFormat::Json);
        handle_pwd(&mut ctx, "t1", Some("/srv".into())).unwrap();
        assert_eq!(client.call_count("cwd_get"), 0);
        assert_eq!(
            client.last_params("cwd_set").unwrap(),
            json!({"session": "t1", "cwd": "/srv"})
        );
    }

    #[test]
    fn test_index_report_json_fields() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0u8, 1, 2]).unwrap();
        let report = index_directory(dir.path()).unwrap();

        let json = index_report_json(&report);
        assert_eq!(json["totalFiles"], 1);
        assert_eq!(json["skipped"][0]["path"], "blob.bin");
        assert_eq!(json["skipped"][0]["reason"], "binary");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime_ms(5_000), "5s");
        assert_eq!(format_uptime_ms(125_000), "2m 5s");
        assert_eq!(format_uptime_ms(3_725_000), "1h 2m 5s");
    }
}
