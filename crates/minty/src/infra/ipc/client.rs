#![expect(
    clippy::print_stderr,
    reason = "CLI status messages during daemon autostart"
)]

//! JSON-RPC client for the daemon socket.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::trace;

use super::error::ClientError;
use super::transport::Connection;
use super::transport::IpcTransport;
use super::transport::default_transport;
use crate::common::Colors;
use crate::common::error_codes;

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);
const STREAM_POLL_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct DaemonClientConfig {
    read_timeout: Duration,
    write_timeout: Duration,
}

impl Default for DaemonClientConfig {
    fn default() -> Self {
        Self {
            // Long enough for a full `execute` timeout plus margin.
            read_timeout: Duration::from_secs(90),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl DaemonClientConfig {
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i32,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

pub trait DaemonClient: Send + Sync {
    fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        self.call_with_config(method, params, &DaemonClientConfig::default())
    }

    fn call_with_config(
        &mut self,
        method: &str,
        params: Option<Value>,
        config: &DaemonClientConfig,
    ) -> Result<Value, ClientError>;

    fn call_stream(
        &mut self,
        _method: &str,
        _params: Option<Value>,
    ) -> Result<StreamResponse, ClientError> {
        Err(ClientError::UnexpectedResponse {
            message: "Streaming RPC not supported by this client".to_string(),
        })
    }
}

pub struct UnixSocketClient {
    transport: Arc<dyn IpcTransport>,
}

impl UnixSocketClient {
    pub fn connect() -> Result<Self, ClientError> {
        Self::connect_with_transport(default_transport())
    }

    pub fn connect_with_transport(transport: Arc<dyn IpcTransport>) -> Result<Self, ClientError> {
        drop(transport.connect()?);
        Ok(Self { transport })
    }

    pub fn is_daemon_running() -> bool {
        default_transport().is_daemon_running()
    }

    fn open(
        &self,
        method: &str,
        params: Option<Value>,
        config: &DaemonClientConfig,
    ) -> Result<(u64, Connection), ClientError> {
        let request_id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let mut connection = self.transport.connect()?;
        connection.set_read_timeout(Some(config.read_timeout()))?;
        connection.set_write_timeout(Some(config.write_timeout()))?;

        let request = serde_json::to_string(&Request {
            jsonrpc: "2.0",
            id: request_id,
            method,
            params,
        })?;
        trace!(request_id, bytes = request.len(), "RPC request serialized");
        connection.send_message(&request)?;
        Ok((request_id, connection))
    }
}

/// Handle that stops a stream from another thread.
#[derive(Clone)]
pub struct StreamAbortHandle {
    aborted: Arc<AtomicBool>,
}

impl StreamAbortHandle {
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }
}

/// Frames of a streaming call. The first frame is buffered by `call_stream`
/// and handed out by the first `next_result`.
pub struct StreamResponse {
    connection: Connection,
    first: Option<Value>,
    aborted: Arc<AtomicBool>,
}

impl StreamResponse {
    pub fn next_result(&mut self) -> Result<Option<Value>, ClientError> {
        if let Some(first) = self.first.take() {
            return Ok(Some(first));
        }
        loop {
            if self.aborted.load(Ordering::Relaxed) {
                let _ = self.connection.shutdown();
                return Ok(None);
            }

            let line = match self.connection.read_message() {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(err) if is_timeout_error(&err) => continue,
                Err(err) => return Err(err),
            };
            let response: Response = serde_json::from_str(&line)?;
            return response_to_result(response).map(Some);
        }
    }

    pub fn abort_handle(&self) -> StreamAbortHandle {
        StreamAbortHandle {
            aborted: Arc::clone(&self.aborted),
        }
    }
}

impl Drop for StreamResponse {
    fn drop(&mut self) {
        let _ = self.connection.shutdown();
    }
}

fn is_timeout_error(error: &ClientError) -> bool {
    match error {
        ClientError::ConnectionFailed(io_err) => matches!(
            io_err.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ),
        _ => false,
    }
}

fn response_to_result(response: Response) -> Result<Value, ClientError> {
    let Some(rpc_error) = response.error else {
        return response.result.ok_or(ClientError::InvalidResponse);
    };

    let data = rpc_error.data.as_ref();
    let category = data
        .and_then(|d| d.get("category"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<error_codes::ErrorCategory>().ok())
        .or_else(|| Some(error_codes::category_for_code(rpc_error.code)));
    let retryable = data
        .and_then(|d| d.get("retryable"))
        .and_then(Value::as_bool)
        .unwrap_or_else(|| error_codes::is_retryable(rpc_error.code));
    let suggestion = data
        .and_then(|d| d.get("suggestion"))
        .and_then(Value::as_str)
        .map(String::from);

    Err(ClientError::RpcError {
        code: rpc_error.code,
        message: rpc_error.message,
        category,
        retryable,
        suggestion,
    })
}

impl DaemonClient for UnixSocketClient {
    fn call_with_config(
        &mut self,
        method: &str,
        params: Option<Value>,
        config: &DaemonClientConfig,
    ) -> Result<Value, ClientError> {
        let start = Instant::now();
        let (request_id, mut connection) = self.open(method, params, config)?;
        let line = connection
            .read_message()?
            .ok_or(ClientError::InvalidResponse)?;
        trace!(request_id, bytes = line.len(), "RPC response received");

        let response: Response = serde_json::from_str(&line)?;
        let result = response_to_result(response);
        debug!(
            request_id,
            method = %method,
            elapsed_ms = start.elapsed().as_millis(),
            "RPC call finished"
        );
        result
    }

    fn call_stream(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<StreamResponse, ClientError> {
        let (_, mut connection) = self.open(method, params, &DaemonClientConfig::default())?;
        let line = connection
            .read_message()?
            .ok_or(ClientError::InvalidResponse)?;
        let first = response_to_result(serde_json::from_str(&line)?)?;

        connection.set_read_timeout(Some(STREAM_POLL_TIMEOUT))?;
        Ok(StreamResponse {
            connection,
            first: Some(first),
            aborted: Arc::new(AtomicBool::new(false)),
        })
    }
}

pub fn ensure_daemon() -> Result<UnixSocketClient, ClientError> {
    ensure_daemon_with_transport(default_transport())
}

pub fn ensure_daemon_with_transport(
    transport: Arc<dyn IpcTransport>,
) -> Result<UnixSocketClient, ClientError> {
    if !transport.is_daemon_running() {
        if !transport.supports_autostart() {
            return Err(ClientError::DaemonNotRunning);
        }
        debug!("Daemon not running; starting it");
        eprintln!("{} Starting daemon in background...", Colors::dim("Note:"));
        transport.start_daemon_background()?;
    }
    UnixSocketClient::connect_with_transport(transport)
}
