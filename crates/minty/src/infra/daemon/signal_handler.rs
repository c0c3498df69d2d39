//! Turns SIGINT/SIGTERM into the daemon's shutdown flag.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;

use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGTERM;
use signal_hook::iterator::Handle;
use signal_hook::iterator::Signals;
use tracing::debug;
use tracing::info;

use crate::common::DaemonError;
use crate::usecases::ports::ShutdownNotifierHandle;

fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        _ => "unknown",
    }
}

/// Owns the listener thread; dropping it unregisters the handlers.
pub struct SignalHandler {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalHandler {
    pub fn setup(
        shutdown: Arc<AtomicBool>,
        notifier: ShutdownNotifierHandle,
    ) -> Result<Self, DaemonError> {
        let mut signals =
            Signals::new([SIGINT, SIGTERM]).map_err(|e| DaemonError::SignalSetup(e.to_string()))?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("minty-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    if shutdown.swap(true, Ordering::SeqCst) {
                        debug!(signal = signal_name(signal), "Shutdown already in progress");
                        continue;
                    }
                    info!(signal = signal_name(signal), "Shutting down daemon");
                    notifier.notify();
                }
            })
            .map_err(|e| DaemonError::SignalSetup(format!("signal thread: {e}")))?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
