mod rpc_core;
mod server;
mod transport;

pub use server::DaemonServer;
pub use server::start_daemon;
pub use transport::TransportError;
