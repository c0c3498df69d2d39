use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::infra::daemon::{
    CommandCatalog, LibraryStore, OutputRouter, SystemInfo, WindowCoordinator,
};
use crate::infra::indexer::IndexerProcess;
use crate::usecases::ports::{
    CommandRunner, DirectoryStore, SessionRepository, ShutdownNotifierHandle, SystemInfoProvider,
};
use crate::usecases::{
    CreateSessionUseCaseImpl, ExecuteUseCaseImpl, HealthUseCaseImpl, RemoveSessionUseCaseImpl,
    ResizeUseCaseImpl, SessionInfoUseCaseImpl, SessionsUseCaseImpl, ShutdownUseCaseImpl,
    SignalUseCaseImpl, TrackedDirUseCaseImpl, WriteUseCaseImpl,
};

pub struct UseCaseContainer<R, D, C>
where
    R: SessionRepository + 'static,
    D: DirectoryStore + 'static,
    C: CommandRunner + 'static,
{
    pub session: SessionUseCases<R, D>,
    pub exec: ExecUseCases<C, D>,
    pub system: SystemUseCases<R>,
    pub windows: WindowCoordinator<R>,
    pub library: LibraryStore,
    pub indexer: IndexerProcess,
}

pub struct SessionUseCases<R: SessionRepository + 'static, D: DirectoryStore + 'static> {
    pub create: CreateSessionUseCaseImpl<R>,
    pub remove: RemoveSessionUseCaseImpl<R>,
    pub write: WriteUseCaseImpl<R>,
    pub resize: ResizeUseCaseImpl<R>,
    pub signal: SignalUseCaseImpl<R>,
    pub info: SessionInfoUseCaseImpl<R, D>,
    pub sessions: SessionsUseCaseImpl<R, D>,
}

pub struct ExecUseCases<C: CommandRunner + 'static, D: DirectoryStore + 'static> {
    pub execute: ExecuteUseCaseImpl<C, D>,
    pub tracked_dir: TrackedDirUseCaseImpl<D>,
    pub commands: CommandCatalog,
    pub home: PathBuf,
}

pub struct SystemUseCases<R: SessionRepository + 'static> {
    pub health: HealthUseCaseImpl<R>,
    pub shutdown: ShutdownUseCaseImpl,
    pub info: SystemInfo,
}

/// Everything the container needs besides the three ports.
pub struct DaemonServices {
    pub home: PathBuf,
    pub exec_timeout: Duration,
    pub keep_sessions: bool,
    pub commands: CommandCatalog,
    pub system_info: SystemInfo,
    pub status: Arc<dyn SystemInfoProvider>,
    pub shutdown_flag: Arc<AtomicBool>,
    pub notifier: ShutdownNotifierHandle,
    pub library: LibraryStore,
    pub indexer: IndexerProcess,
}

impl<R, D, C> UseCaseContainer<R, D, C>
where
    R: SessionRepository + 'static,
    D: DirectoryStore + 'static,
    C: CommandRunner + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directories: Arc<D>,
        runner: Arc<C>,
        router: Arc<OutputRouter>,
        services: DaemonServices,
    ) -> Self {
        let home = services.home;
        Self {
            session: SessionUseCases {
                create: CreateSessionUseCaseImpl::new(Arc::clone(&repository), home.clone()),
                remove: RemoveSessionUseCaseImpl::new(Arc::clone(&repository)),
                write: WriteUseCaseImpl::new(Arc::clone(&repository)),
                resize: ResizeUseCaseImpl::new(Arc::clone(&repository)),
                signal: SignalUseCaseImpl::new(Arc::clone(&repository)),
                info: SessionInfoUseCaseImpl::new(
                    Arc::clone(&repository),
                    Arc::clone(&directories),
                ),
                sessions: SessionsUseCaseImpl::new(
                    Arc::clone(&repository),
                    Arc::clone(&directories),
                    home.clone(),
                ),
            },
            exec: ExecUseCases {
                execute: ExecuteUseCaseImpl::new(
                    runner,
                    Arc::clone(&directories),
                    home.clone(),
                    services.exec_timeout,
                ),
                tracked_dir: TrackedDirUseCaseImpl::new(directories, home.clone()),
                commands: services.commands,
                home,
            },
            system: SystemUseCases {
                health: HealthUseCaseImpl::new(Arc::clone(&repository), services.status),
                shutdown: ShutdownUseCaseImpl::new(services.shutdown_flag, services.notifier),
                info: services.system_info,
            },
            windows: WindowCoordinator::new(router, repository, services.keep_sessions),
            library: services.library,
            indexer: services.indexer,
        }
    }
}
