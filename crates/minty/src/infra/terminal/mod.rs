mod error;
mod pty;
mod shell_env;

pub use error::PtyError;
pub use error::SpawnErrorKind;
pub use pty::PtyHandle;
pub use pty::SpawnSpec;
pub use pty::UNKNOWN_EXIT_CODE;
pub(crate) use pty::ReadEvent;
pub use shell_env::ShellEnvironment;
pub use shell_env::EXTRA_PATH_DIRS;
