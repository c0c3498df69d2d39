#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Minty: a daemon that owns PTY shell sessions for terminal front ends,
//! and the `minty` client that drives it over a Unix socket.

pub mod adapters;
pub mod app;
pub mod common;
pub mod domain;
pub mod infra;
pub mod usecases;

#[cfg(test)]
mod test_support;

pub use app::Application;
pub use common::Colors;
pub use infra::daemon::SessionRegistry;
pub use infra::ipc::ClientError;
pub use infra::ipc::DaemonClient;
