pub mod daemon;
mod rpc;

pub use rpc::*;
