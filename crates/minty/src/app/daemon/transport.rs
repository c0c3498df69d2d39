//! Server side of one client connection: newline-delimited JSON-RPC with a
//! per-line size cap.

use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::adapters::{RpcRequest, RpcResponse};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid request: {message}")]
    InvalidRequest { id: u64, message: String },
    #[error("Request size limit exceeded (max {max_bytes} bytes)")]
    SizeLimit { max_bytes: usize },
    #[error("Connection timeout")]
    Timeout,
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset => Self::ConnectionClosed,
            _ => Self::Io(err),
        }
    }
}

struct SizeLimitedReader<R> {
    inner: R,
    max_size: usize,
}

impl<R: BufRead> SizeLimitedReader<R> {
    fn new(inner: R, max_size: usize) -> Self {
        Self { inner, max_size }
    }

    /// One line without its terminator. Reads at most `max_size + 1` bytes
    /// so an oversized line never lands in memory whole.
    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        let mut buf = Vec::new();
        let limit = u64::try_from(self.max_size).unwrap_or(u64::MAX).saturating_add(1);
        let n = (&mut self.inner).take(limit).read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        } else if n > self.max_size {
            return Err(TransportError::SizeLimit {
                max_bytes: self.max_size,
            });
        }
        String::from_utf8(buf)
            .map(Some)
            .map_err(|e| TransportError::Parse(e.to_string()))
    }
}

pub struct DaemonConnection {
    reader: SizeLimitedReader<BufReader<UnixStream>>,
    writer: UnixStream,
}

impl DaemonConnection {
    pub fn new(stream: UnixStream, max_request_bytes: usize) -> Result<Self, TransportError> {
        // Accepted sockets inherit nothing useful; timeouts need blocking mode.
        stream.set_nonblocking(false)?;
        let reader_stream = stream.try_clone()?;
        Ok(Self {
            reader: SizeLimitedReader::new(BufReader::new(reader_stream), max_request_bytes),
            writer: stream,
        })
    }

    pub fn read_request(&mut self) -> Result<RpcRequest, TransportError> {
        loop {
            match self.reader.read_line()? {
                None => return Err(TransportError::ConnectionClosed),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return parse_request(&line),
            }
        }
    }

    pub fn write_response(&mut self, response: &RpcResponse) -> Result<(), TransportError> {
        let json = serde_json::to_string(response)
            .map_err(|e| TransportError::Parse(format!("Failed to serialize response: {e}")))?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.writer.set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.writer.set_write_timeout(timeout)?;
        Ok(())
    }

    /// True once the client has hung up. Never blocks and never consumes
    /// buffered input.
    pub fn peer_closed(&self) -> bool {
        let mut byte = [0u8; 1];
        // SAFETY: the fd belongs to `self.writer` and `byte` outlives the call.
        let rc = unsafe {
            libc::recv(
                self.writer.as_raw_fd(),
                byte.as_mut_ptr().cast(),
                1,
                libc::MSG_PEEK | libc::MSG_DONTWAIT,
            )
        };
        match rc {
            0 => true,
            n if n > 0 => false,
            _ => {
                let err = std::io::Error::last_os_error();
                !matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
                )
            }
        }
    }
}

fn parse_request(line: &str) -> Result<RpcRequest, TransportError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| TransportError::Parse(e.to_string()))?;
    let id = value.get("id").and_then(Value::as_u64).unwrap_or(0);
    serde_json::from_value(value).map_err(|e| TransportError::InvalidRequest {
        id,
        message: e.to_string(),
    })
}
