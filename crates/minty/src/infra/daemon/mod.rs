#![deny(clippy::all)]
mod commands;
mod config;
mod coordinator;
mod directory;
mod exec;
mod file_lock;
mod journal;
mod library;
mod output_router;
mod process;
mod session;
mod signal_handler;
mod system_info;
mod windows;

pub use commands::CommandCatalog;
pub use config::DEFAULT_EXEC_TIMEOUT_SECS;
pub use config::DEFAULT_MAX_SESSIONS;
pub use config::DaemonConfig;
pub use coordinator::CloseOutcome;
pub use coordinator::CoordinatorError;
pub use coordinator::DEFAULT_WINDOW_TITLE;
pub use coordinator::WindowCoordinator;
pub use coordinator::WindowListing;
pub use coordinator::WindowRequest;
pub use directory::DirectoryTracker;
pub use exec::PtyCommandRunner;
pub use file_lock::LockFile;
pub use file_lock::lock_holder_pid;
pub use file_lock::remove_lock_file;
pub use journal::JournalRecord;
pub use journal::PersistenceError;
pub use journal::SessionJournal;
pub use library::LibraryError;
pub use library::LibraryStore;
pub use output_router::OutputRouter;
pub use process::process_cwd;
pub use session::Session;
pub use session::SessionRegistry;
pub use signal_handler::SignalHandler;
pub use system_info::DaemonStatus;
pub use system_info::SystemInfo;
pub use system_info::Uptime;
pub use system_info::VERSION;
pub use windows::Delivery;
pub use windows::WindowError;
pub use windows::WindowKind;
pub use windows::WindowRegistry;
pub use windows::WindowSummary;
