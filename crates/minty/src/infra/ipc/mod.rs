#![deny(clippy::all)]

pub mod client;
pub mod error;
#[cfg(test)]
pub mod mock_client;
pub mod socket;
pub mod transport;

pub use client::DaemonClient;
pub use client::DaemonClientConfig;
pub use client::StreamAbortHandle;
pub use client::StreamResponse;
pub use client::UnixSocketClient;
pub use client::ensure_daemon;
pub use error::ClientError;
#[cfg(test)]
pub use mock_client::MockClient;
pub use socket::lock_path;
pub use socket::log_path;
pub use socket::socket_path;
pub use transport::FOREGROUND_ENV;
pub use transport::start_daemon_background;

pub type Result<T> = std::result::Result<T, ClientError>;
