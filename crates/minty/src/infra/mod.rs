pub mod daemon;
pub mod indexer;
pub mod ipc;
pub mod terminal;
