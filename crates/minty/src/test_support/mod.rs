//! Shared test support utilities for the crate.

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;

pub use crate::usecases::ports::test_support::RecordingRunner;

/// Serializes tests that read process-wide variables such as `MINTY_SOCKET`.
pub fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// Restores an environment variable when dropped.
pub struct EnvGuard {
    key: &'static str,
    prev: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &'static str, value: &str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: Test-only environment override.
        unsafe {
            std::env::set_var(key, value);
        }
        Self { key, prev }
    }

    pub fn remove(key: &'static str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: Test-only environment override.
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, prev }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.prev.take() {
            // SAFETY: Test-only environment restoration.
            Some(prev) => unsafe { std::env::set_var(self.key, prev) },
            // SAFETY: Test-only environment cleanup.
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}
