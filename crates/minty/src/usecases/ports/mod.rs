pub mod command_runner;
pub mod directory_store;
pub mod errors;
pub mod session_repository;
pub mod shutdown_notifier;
pub mod system_info;
#[cfg(test)]
pub(crate) mod test_support;

pub use command_runner::{CommandOutcome, CommandRequest, CommandRunner};
pub use directory_store::DirectoryStore;
pub use errors::SessionError;
pub use session_repository::{CreateSession, CreatedSession, SessionRepository};
pub use shutdown_notifier::{NoopShutdownNotifier, ShutdownNotifier, ShutdownNotifierHandle};
pub use system_info::SystemInfoProvider;
