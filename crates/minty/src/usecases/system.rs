use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::usecases::ports::{SessionRepository, ShutdownNotifierHandle, SystemInfoProvider};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthOutput {
    pub status: String,
    pub pid: u32,
    pub uptime_ms: u64,
    pub session_count: usize,
    pub window_count: usize,
    pub version: String,
}

pub trait HealthUseCase: Send + Sync {
    fn execute(&self) -> HealthOutput;
}

pub struct HealthUseCaseImpl<R: SessionRepository> {
    repository: Arc<R>,
    system_info: Arc<dyn SystemInfoProvider>,
}

impl<R: SessionRepository> HealthUseCaseImpl<R> {
    pub fn new(repository: Arc<R>, system_info: Arc<dyn SystemInfoProvider>) -> Self {
        Self {
            repository,
            system_info,
        }
    }
}

impl<R: SessionRepository> HealthUseCase for HealthUseCaseImpl<R> {
    fn execute(&self) -> HealthOutput {
        HealthOutput {
            status: "healthy".to_string(),
            pid: self.system_info.pid(),
            uptime_ms: self.system_info.uptime_ms(),
            session_count: self.repository.session_count(),
            window_count: self.system_info.window_count(),
            version: self.system_info.version(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownOutput {
    pub acknowledged: bool,
}

pub trait ShutdownUseCase: Send + Sync {
    fn execute(&self) -> ShutdownOutput;
}

pub struct ShutdownUseCaseImpl {
    shutdown_flag: Arc<AtomicBool>,
    notifier: ShutdownNotifierHandle,
}

impl ShutdownUseCaseImpl {
    pub fn new(shutdown_flag: Arc<AtomicBool>, notifier: ShutdownNotifierHandle) -> Self {
        Self {
            shutdown_flag,
            notifier,
        }
    }
}

impl ShutdownUseCase for ShutdownUseCaseImpl {
    #[tracing::instrument(skip(self))]
    fn execute(&self) -> ShutdownOutput {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        self.notifier.notify();
        ShutdownOutput { acknowledged: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::ports::NoopShutdownNotifier;
    use crate::usecases::ports::test_support::MockSessionRepository;

    struct FixedInfo;

    impl SystemInfoProvider for FixedInfo {
        fn pid(&self) -> u32 {
            77
        }

        fn uptime_ms(&self) -> u64 {
            1500
        }

        fn version(&self) -> String {
            "0.0.1".to_string()
        }

        fn window_count(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_health_reports_counts() {
        let repo = Arc::new(MockSessionRepository::with_session("t1"));
        let output = HealthUseCaseImpl::new(repo, Arc::new(FixedInfo)).execute();
        assert_eq!(output.status, "healthy");
        assert_eq!(output.pid, 77);
        assert_eq!(output.session_count, 1);
        assert_eq!(output.window_count, 2);
    }

    #[test]
    fn test_shutdown_sets_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let usecase = ShutdownUseCaseImpl::new(Arc::clone(&flag), Arc::new(NoopShutdownNotifier));
        assert!(usecase.execute().acknowledged);
        assert!(flag.load(Ordering::SeqCst));
    }
}
