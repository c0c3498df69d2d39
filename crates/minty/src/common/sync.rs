//! Lock helpers that survive poisoning.
//!
//! A panic inside a session pump must not take the whole daemon down with it,
//! so every shared map is accessed through these helpers instead of `lock()`.

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

static POISON_RECOVERY_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn poison_recovery_count() -> u64 {
    POISON_RECOVERY_COUNT.load(Ordering::Relaxed)
}

fn recover<G>(poisoned: PoisonError<G>, lock_kind: &'static str) -> G {
    POISON_RECOVERY_COUNT.fetch_add(1, Ordering::Relaxed);
    error!(
        lock_kind,
        "Lock poisoned: a thread panicked while holding it. State may be inconsistent; recovering."
    );
    poisoned.into_inner()
}

pub fn rwlock_read_or_recover<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| recover(p, "rwlock_read"))
}

pub fn rwlock_write_or_recover<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| recover(p, "rwlock_write"))
}

pub fn mutex_lock_or_recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|p| recover(p, "mutex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mutex_recovers_after_panic() {
        let lock = Arc::new(Mutex::new(7));
        let cloned = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison");
        })
        .join();

        let before = poison_recovery_count();
        let guard = mutex_lock_or_recover(&lock);
        assert_eq!(*guard, 7);
        assert!(poison_recovery_count() > before);
    }

    #[test]
    fn test_rwlock_write_recovers_after_panic() {
        let lock = Arc::new(RwLock::new(vec![1]));
        let cloned = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = cloned.write().unwrap();
            panic!("poison");
        })
        .join();

        rwlock_write_or_recover(&lock).push(2);
        assert_eq!(*rwlock_read_or_recover(&lock), vec![1, 2]);
    }
}
