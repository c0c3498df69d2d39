//! Thin daemon request handlers that invoke use cases.

mod common;
pub mod exec;
pub mod index;
pub mod library;
pub mod session;
pub mod system;
pub mod window;
