#![deny(clippy::all)]

mod color;
pub mod daemon_error;
pub mod error_codes;
mod sync;
pub mod telemetry;

pub use color::Colors;
pub use color::init as color_init;
pub use daemon_error::DaemonError;
pub use sync::mutex_lock_or_recover;
pub use sync::poison_recovery_count;
pub use sync::rwlock_read_or_recover;
pub use sync::rwlock_write_or_recover;
