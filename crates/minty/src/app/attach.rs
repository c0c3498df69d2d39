#![expect(clippy::print_stderr, reason = "attach banner goes to stderr")]

//! Interactive passthrough to one session through an observer window.

use std::io;
use std::io::Write;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crossterm::event;
use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use crossterm::execute;
use crossterm::terminal;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use serde_json::Value;
use serde_json::json;
use tracing::debug;

pub use crate::app::error::AttachError;
use crate::common::Colors;
use crate::infra::ipc::ClientError;
use crate::infra::ipc::DaemonClient;
use crate::infra::ipc::StreamResponse;

const DETACH_BYTE: u8 = 0x1c;
const EVENT_POLL: Duration = Duration::from_millis(20);

/// Ignores a signal for its lifetime and restores the default on drop.
/// Signal dispositions are process-global, so only the main thread uses it.
#[must_use = "dropping the guard restores the default handler"]
struct SignalGuard {
    signal: libc::c_int,
}

impl SignalGuard {
    fn new(signal: libc::c_int) -> Self {
        // SAFETY: SIG_IGN is a valid disposition for any catchable signal.
        unsafe {
            libc::signal(signal, libc::SIG_IGN);
        }
        Self { signal }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        // SAFETY: restoring SIG_DFL is always valid.
        unsafe {
            libc::signal(self.signal, libc::SIG_DFL);
        }
    }
}

/// Raw mode plus the alternate screen, undone on drop so a crash never
/// leaves the user's shell unusable.
#[must_use = "TerminalGuard must be held for the duration of the attach session"]
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AttachError> {
        enable_raw_mode().map_err(AttachError::Terminal)?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, terminal::EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AttachError::Terminal(err));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, terminal::LeaveAlternateScreen);
        let _ = stdout.write_all(b"\x1b[0m\x1b(B\x1b[?25h\x1b[?1l\x1b>");
        let _ = stdout.flush();
    }
}

enum StreamEvent {
    Exited(i32),
    Closed,
    Failed(String),
}

/// Attaches the terminal to `session_id` until Ctrl+\ or the session exits.
pub fn attach<C: DaemonClient>(client: &mut C, session_id: &str) -> Result<(), AttachError> {
    let created = client
        .call(
            "window_create",
            Some(json!({ "observer": true, "session": session_id, "title": "attach" })),
        )
        .map_err(|e| AttachError::Stream(format_client_error(&e)))?;
    let window_id = created
        .get("window_id")
        .and_then(Value::as_str)
        .ok_or_else(|| AttachError::Stream(failure_message(&created)))?
        .to_string();

    let result = run_attached(client, session_id, &window_id);

    if let Err(e) = client.call("window_close", Some(json!({ "window": window_id }))) {
        debug!(error = %e, window_id, "Observer window already gone");
    }
    result
}

fn run_attached<C: DaemonClient>(
    client: &mut C,
    session_id: &str,
    window_id: &str,
) -> Result<(), AttachError> {
    let mut stream = client
        .call_stream("subscribe", Some(json!({ "window": window_id })))
        .map_err(|e| AttachError::Stream(format_client_error(&e)))?;
    let abort = stream.abort_handle();

    eprintln!(
        "{} Attaching to session {}... press {} to detach.",
        Colors::dim("[attach]"),
        Colors::id(session_id),
        Colors::bold("Ctrl+\\")
    );

    let _sigquit_guard = SignalGuard::new(libc::SIGQUIT);
    let term_guard = TerminalGuard::new()?;

    if let Ok((cols, rows)) = terminal::size() {
        resize(client, session_id, cols, rows);
    }

    let (tx, rx) = mpsc::channel();
    let owned_session = session_id.to_string();
    let pump = thread::Builder::new()
        .name("attach-output".to_string())
        .spawn(move || pump_output(&mut stream, &owned_session, &tx))
        .map_err(AttachError::Terminal)?;

    let result = input_loop(client, session_id, &rx);

    abort.abort();
    let _ = pump.join();
    drop(term_guard);

    match &result {
        Ok(Some(code)) => eprintln!(
            "{} Session {} exited with code {}",
            Colors::dim("[attach]"),
            Colors::id(session_id),
            code
        ),
        _ => eprintln!(
            "{} Detached from session {}",
            Colors::dim("[attach]"),
            Colors::id(session_id)
        ),
    }
    result.map(|_| ())
}

/// Writes this session's output to stdout until the stream ends.
fn pump_output(stream: &mut StreamResponse, session_id: &str, tx: &mpsc::Sender<StreamEvent>) {
    let mut stdout = io::stdout();
    let end = loop {
        let frame = match stream.next_result() {
            Ok(Some(frame)) => frame,
            Ok(None) => break StreamEvent::Closed,
            Err(e) => break StreamEvent::Failed(format_client_error(&e)),
        };
        if frame.get("session_id").and_then(Value::as_str) != Some(session_id) {
            if frame.get("event").and_then(Value::as_str) == Some("closed") {
                break StreamEvent::Closed;
            }
            continue;
        }
        match frame.get("event").and_then(Value::as_str) {
            Some("output") => {
                let Some(data) = frame
                    .get("data")
                    .and_then(Value::as_str)
                    .and_then(|encoded| STANDARD.decode(encoded).ok())
                else {
                    continue;
                };
                if stdout.write_all(&data).and_then(|()| stdout.flush()).is_err() {
                    break StreamEvent::Closed;
                }
            }
            Some("exit") => {
                let code = frame
                    .get("exit_code")
                    .and_then(Value::as_i64)
                    .and_then(|c| i32::try_from(c).ok())
                    .unwrap_or(0);
                break StreamEvent::Exited(code);
            }
            _ => {}
        }
    };
    let _ = tx.send(end);
}

/// Forwards keys and resizes. Returns the exit code when the session ended.
fn input_loop<C: DaemonClient>(
    client: &mut C,
    session_id: &str,
    rx: &mpsc::Receiver<StreamEvent>,
) -> Result<Option<i32>, AttachError> {
    loop {
        match rx.try_recv() {
            Ok(StreamEvent::Exited(code)) => return Ok(Some(code)),
            Ok(StreamEvent::Closed) | Err(mpsc::TryRecvError::Disconnected) => return Ok(None),
            Ok(StreamEvent::Failed(reason)) => return Err(AttachError::Stream(reason)),
            Err(mpsc::TryRecvError::Empty) => {}
        }

        if !event::poll(EVENT_POLL).map_err(|_| AttachError::EventRead)? {
            continue;
        }
        match event::read().map_err(|_| AttachError::EventRead)? {
            Event::Key(key_event) if key_event.kind != KeyEventKind::Release => {
                let Some(bytes) = key_event_to_bytes(&key_event) else {
                    continue;
                };
                if bytes == [DETACH_BYTE] {
                    return Ok(None);
                }
                write_bytes(client, session_id, &bytes)?;
            }
            Event::Paste(text) => write_bytes(client, session_id, text.as_bytes())?,
            Event::Resize(cols, rows) => resize(client, session_id, cols, rows),
            _ => {}
        }
    }
}

fn write_bytes<C: DaemonClient>(
    client: &mut C,
    session_id: &str,
    bytes: &[u8],
) -> Result<(), AttachError> {
    let params = json!({ "session": session_id, "data_base64": STANDARD.encode(bytes) });
    let result = client
        .call("session_write", Some(params))
        .map_err(|e| AttachError::SessionWrite(format_client_error(&e)))?;
    if result.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(AttachError::SessionWrite(failure_message(&result)));
    }
    Ok(())
}

fn resize<C: DaemonClient>(client: &mut C, session_id: &str, cols: u16, rows: u16) {
    let params = json!({ "session": session_id, "cols": cols, "rows": rows });
    if let Err(e) = client.call("session_resize", Some(params)) {
        debug!(error = %e, "Resize failed");
    }
}

fn failure_message(result: &Value) -> String {
    result
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unexpected response")
        .to_string()
}

fn format_client_error(error: &ClientError) -> String {
    let mut msg = error.to_string();
    if let Some(suggestion) = error.suggestion() {
        msg.push_str(&format!(" ({})", suggestion));
    }
    msg
}

fn key_event_to_bytes(key_event: &event::KeyEvent) -> Option<Vec<u8>> {
    use KeyCode::*;

    let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key_event.modifiers.contains(KeyModifiers::ALT);

    match key_event.code {
        Char(c) if ctrl => match c {
            'a'..='z' => Some(vec![c as u8 - b'a' + 1]),
            'A'..='Z' => Some(vec![c as u8 - b'A' + 1]),
            '[' | '3' => Some(vec![0x1b]),
            '\\' | '4' => Some(vec![0x1c]),
            ']' | '5' => Some(vec![0x1d]),
            '^' | '6' => Some(vec![0x1e]),
            '_' | '7' => Some(vec![0x1f]),
            '?' | '8' => Some(vec![0x7f]),
            ' ' | '2' | '@' => Some(vec![0x00]),
            _ => None,
        },
        Char(c) => {
            let mut buf = [0u8; 4];
            let encoded = c.encode_utf8(&mut buf).as_bytes();
            let mut bytes = Vec::with_capacity(encoded.len() + 1);
            if alt {
                bytes.push(0x1b);
            }
            bytes.extend_from_slice(encoded);
            Some(bytes)
        }
        Enter => Some(vec![b'\r']),
        Tab if key_event.modifiers.contains(KeyModifiers::SHIFT) => Some(b"\x1b[Z".to_vec()),
        Tab => Some(vec![b'\t']),
        BackTab => Some(b"\x1b[Z".to_vec()),
        Backspace => Some(vec![0x7f]),
        Delete => Some(b"\x1b[3~".to_vec()),
        Esc => Some(vec![0x1b]),
        Up => Some(b"\x1b[A".to_vec()),
        Down => Some(b"\x1b[B".to_vec()),
        Right => Some(b"\x1b[C".to_vec()),
        Left => Some(b"\x1b[D".to_vec()),
        Home => Some(b"\x1b[H".to_vec()),
        End => Some(b"\x1b[F".to_vec()),
        PageUp => Some(b"\x1b[5~".to_vec()),
        PageDown => Some(b"\x1b[6~".to_vec()),
        Insert => Some(b"\x1b[2~".to_vec()),
        F(n) => function_key(n),
        _ => None,
    }
}

fn function_key(n: u8) -> Option<Vec<u8>> {
    let seq: &[u8] = match n {
        1 => b"\x1bOP",
        2 => b"\x1bOQ",
        3 => b"\x1bOR",
        4 => b"\x1bOS",
        5 => b"\x1b[15~",
        6 => b"\x1b[17~",
        7 => b"\x1b[18~",
        8 => b"\x1b[19~",
        9 => b"\x1b[20~",
        10 => b"\x1b[21~",
        11 => b"\x1b[23~",
        12 => b"\x1b[24~",
        _ => return None,
    };
    Some(seq.to_vec())
}
