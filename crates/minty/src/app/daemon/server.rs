use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{self as channel, RecvTimeoutError, TrySendError};
use tracing::{debug, error, info, warn};

use super::rpc_core::{self, HEARTBEAT_INTERVAL};
use super::transport::{DaemonConnection, TransportError};
use crate::adapters::daemon::{DaemonServices, Router, STREAMING_METHODS, UseCaseContainer};
use crate::adapters::{RpcRequest, RpcResponse};
use crate::common::error_codes;
use crate::common::telemetry;
use crate::common::DaemonError;
use crate::infra::daemon::{
    CommandCatalog, DaemonConfig, DaemonStatus, DirectoryTracker, LibraryStore, LockFile,
    OutputRouter, PtyCommandRunner, SessionJournal, SessionRegistry, SignalHandler, SystemInfo,
    WindowRegistry, remove_lock_file,
};
use crate::infra::indexer::IndexerProcess;
use crate::infra::ipc::{lock_path, socket_path};
use crate::infra::terminal::ShellEnvironment;
use crate::usecases::ports::{ShutdownNotifier, ShutdownNotifierHandle};

const CHANNEL_CAPACITY: usize = 128;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const ACCEPT_POLL_MS: libc::c_int = 250;

type DaemonUseCases = UseCaseContainer<SessionRegistry, DirectoryTracker, PtyCommandRunner>;

pub struct DaemonServer {
    usecases: DaemonUseCases,
    config: DaemonConfig,
    active_connections: AtomicUsize,
}

impl DaemonServer {
    pub fn with_config(
        config: DaemonConfig,
        shutdown_flag: Arc<AtomicBool>,
        notifier: ShutdownNotifierHandle,
    ) -> Self {
        let shell_env = Arc::new(ShellEnvironment::detect());
        let windows = Arc::new(WindowRegistry::new(config.window_queue()));
        let router = Arc::new(OutputRouter::new(Arc::clone(&windows)));
        let directories = Arc::new(DirectoryTracker::new());

        let journal = Arc::new(SessionJournal::new(config.session_store().clone()));
        if let Err(e) = journal.cleanup_stale_sessions() {
            warn!(error = %e, path = %journal.path().display(), "Stale session cleanup failed");
        }
        let registry = Arc::new(
            SessionRegistry::new(
                Arc::clone(&shell_env),
                Arc::clone(&router),
                Arc::clone(&directories),
                config.max_sessions(),
            )
            .with_journal(journal),
        );
        let runner = Arc::new(PtyCommandRunner::new(Arc::clone(&shell_env)));

        let indexer = IndexerProcess::current().unwrap_or_else(|e| {
            warn!(error = %e, "Cannot locate own executable; index_run will use PATH");
            IndexerProcess::new(PathBuf::from("minty"))
        });
        let services = DaemonServices {
            home: shell_env.home().to_path_buf(),
            exec_timeout: config.exec_timeout(),
            keep_sessions: config.keep_sessions(),
            commands: CommandCatalog::new(shell_env.path_dirs()),
            system_info: SystemInfo::collect(&shell_env),
            status: Arc::new(DaemonStatus::new(windows)),
            shutdown_flag,
            notifier,
            library: LibraryStore::new(config.library_dir().clone()),
            indexer,
        };

        Self {
            usecases: UseCaseContainer::new(registry, directories, runner, router, services),
            config,
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Terminates every session; after this the daemon owns no processes.
    pub fn shutdown_all_sessions(&self) -> usize {
        self.usecases.windows.shutdown()
    }

    fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        Router::new(&self.usecases).route(request)
    }

    fn handle_client(self: &Arc<Self>, stream: UnixStream) {
        let mut conn = match DaemonConnection::new(stream, self.config.max_request_bytes()) {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "Failed to set up client connection");
                return;
            }
        };
        if let Err(e) = conn.set_read_timeout(Some(self.config.idle_timeout())) {
            error!(error = %e, "Failed to set read timeout");
            return;
        }
        if let Err(e) = conn.set_write_timeout(Some(WRITE_TIMEOUT)) {
            error!(error = %e, "Failed to set write timeout");
            return;
        }

        loop {
            let request = match conn.read_request() {
                Ok(request) => request,
                Err(TransportError::ConnectionClosed) | Err(TransportError::Timeout) => break,
                Err(TransportError::SizeLimit { max_bytes }) => {
                    let response = RpcResponse::parse_error(&format!(
                        "Parse error: request size limit exceeded ({max_bytes} bytes max)"
                    ));
                    let _ = conn.write_response(&response);
                    break;
                }
                Err(TransportError::Parse(msg)) => {
                    let response = RpcResponse::parse_error(&format!("Parse error: {msg}"));
                    if conn.write_response(&response).is_err() {
                        break;
                    }
                    continue;
                }
                Err(TransportError::InvalidRequest { id, message }) => {
                    let response = RpcResponse::error(
                        id,
                        error_codes::INVALID_REQUEST,
                        &format!("Invalid request: {message}"),
                    );
                    if conn.write_response(&response).is_err() {
                        break;
                    }
                    continue;
                }
                Err(TransportError::Io(e)) => {
                    error!(error = %e, "Client connection error");
                    break;
                }
            };

            if STREAMING_METHODS.contains(&request.method.as_str()) {
                self.spawn_stream(conn, request);
                return;
            }

            let response = self.handle_request(request);
            match conn.write_response(&response) {
                Ok(()) => {}
                Err(TransportError::ConnectionClosed) => break,
                Err(e) => {
                    error!(error = %e, "Client write error");
                    break;
                }
            }
        }
    }

    fn spawn_stream(self: &Arc<Self>, mut conn: DaemonConnection, request: RpcRequest) {
        let server = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("stream-{}", request.id))
            .spawn(move || {
                if let Err(e) = conn.set_read_timeout(None) {
                    warn!(error = %e, "Failed to clear stream read timeout");
                }
                let end = rpc_core::serve_subscription(
                    &server.usecases.windows,
                    &mut conn,
                    request,
                    HEARTBEAT_INTERVAL,
                );
                debug!(?end, "Stream finished");
            });
        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn stream thread");
        }
    }
}

/// Self-pipe that wakes the accept loop when shutdown is requested.
struct WakePipe {
    tx: Arc<UnixStream>,
    rx: UnixStream,
}

impl WakePipe {
    fn new() -> io::Result<Self> {
        let (tx, rx) = UnixStream::pair()?;
        tx.set_nonblocking(true)?;
        rx.set_nonblocking(true)?;
        Ok(Self {
            tx: Arc::new(tx),
            rx,
        })
    }

    fn notifier(&self) -> ShutdownNotifierHandle {
        Arc::new(WakeNotifier {
            tx: Arc::clone(&self.tx),
        })
    }

    fn drain(&self) {
        let mut buf = [0u8; 64];
        while matches!((&self.rx).read(&mut buf), Ok(n) if n > 0) {}
    }
}

struct WakeNotifier {
    tx: Arc<UnixStream>,
}

impl ShutdownNotifier for WakeNotifier {
    fn notify(&self) {
        let _ = (&*self.tx).write_all(&[1]);
    }
}

struct ThreadPool {
    workers: Vec<thread::JoinHandle<()>>,
    sender: channel::Sender<UnixStream>,
}

impl ThreadPool {
    fn new(
        size: usize,
        server: Arc<DaemonServer>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, DaemonError> {
        let (sender, receiver) = channel::bounded::<UnixStream>(CHANNEL_CAPACITY);
        let mut workers = Vec::with_capacity(size);

        for id in 0..size.max(1) {
            let receiver = receiver.clone();
            let server = Arc::clone(&server);
            let shutdown = Arc::clone(&shutdown);
            let spawned = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || {
                    while !shutdown.load(Ordering::Relaxed) {
                        let stream = match receiver.recv_timeout(Duration::from_millis(100)) {
                            Ok(stream) => stream,
                            Err(RecvTimeoutError::Timeout) => continue,
                            Err(RecvTimeoutError::Disconnected) => break,
                        };
                        server.active_connections.fetch_add(1, Ordering::Relaxed);
                        server.handle_client(stream);
                        server.active_connections.fetch_sub(1, Ordering::Relaxed);
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => error!(worker_id = id, error = %e, "Failed to spawn worker"),
            }
        }

        if workers.is_empty() {
            return Err(DaemonError::ThreadPool(
                "failed to spawn any worker threads".to_string(),
            ));
        }
        if workers.len() < size {
            warn!(
                spawned = workers.len(),
                requested = size,
                "Only spawned partial worker threads"
            );
        }
        Ok(Self { workers, sender })
    }

    fn execute(&self, stream: UnixStream) -> Result<(), UnixStream> {
        self.sender.try_send(stream).map_err(|e| match e {
            TrySendError::Full(s) | TrySendError::Disconnected(s) => s,
        })
    }

    fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

fn bind_socket(socket_path: &Path) -> Result<UnixListener, DaemonError> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            DaemonError::SocketBind(format!("failed to create socket directory: {e}"))
        })?;
    }
    // The lock is held, so anything at the path is left over from a crash.
    if socket_path.exists() {
        std::fs::remove_file(socket_path)
            .map_err(|e| DaemonError::SocketBind(format!("failed to remove stale socket: {e}")))?;
    }
    let listener = UnixListener::bind(socket_path)
        .map_err(|e| DaemonError::SocketBind(format!("failed to bind socket: {e}")))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| DaemonError::SocketBind(format!("failed to set non-blocking: {e}")))?;
    Ok(listener)
}

fn wait_readable(listener: &UnixListener, wake: &WakePipe) -> (bool, bool) {
    let mut fds = [
        libc::pollfd {
            fd: listener.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: wake.rx.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
    ];
    // SAFETY: `fds` is a valid array of two pollfd structs for the whole call.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, ACCEPT_POLL_MS) };
    if rc <= 0 {
        return (false, false);
    }
    (fds[0].revents != 0, fds[1].revents != 0)
}

fn run_accept_loop(
    listener: &UnixListener,
    wake: &WakePipe,
    pool: &ThreadPool,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let (incoming, woken) = wait_readable(listener, wake);
        if woken {
            wake.drain();
        }
        if !incoming {
            continue;
        }
        loop {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    if let Err(stream) = pool.execute(stream) {
                        warn!("Worker queue full; dropping connection");
                        drop(stream);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    if !shutdown.load(Ordering::Relaxed) {
                        error!(error = %e, "Error accepting connection");
                    }
                    break;
                }
            }
        }
    }
}

fn wait_for_connections(server: &DaemonServer, timeout: Duration) {
    info!(
        active_connections = server.active_connections.load(Ordering::Relaxed),
        "Waiting for active connections to complete"
    );
    let deadline = Instant::now() + timeout;
    while server.active_connections.load(Ordering::Relaxed) > 0 {
        if Instant::now() > deadline {
            warn!("Shutdown timeout, forcing close");
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn cleanup(socket_path: &Path, lock_path: &Path, server: &DaemonServer, pool: ThreadPool) {
    info!("Terminating sessions...");
    let terminated = server.shutdown_all_sessions();
    debug!(terminated, "Sessions terminated");

    info!("Stopping thread pool...");
    pool.shutdown();

    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
    remove_lock_file(lock_path);
    info!("Daemon shutdown complete");
}

pub fn start_daemon() -> Result<(), DaemonError> {
    let _telemetry = telemetry::init_tracing("info");

    let socket_path = socket_path();
    let lock_path = lock_path(&socket_path);
    if let Some(parent) = lock_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _lock = LockFile::acquire(&lock_path)?;
    let listener = bind_socket(&socket_path)?;

    let config = DaemonConfig::from_env();
    let shutdown = Arc::new(AtomicBool::new(false));
    let wake = WakePipe::new()
        .map_err(|e| DaemonError::SignalSetup(format!("failed to create wake pipe: {e}")))?;
    let server = Arc::new(DaemonServer::with_config(
        config.clone(),
        Arc::clone(&shutdown),
        wake.notifier(),
    ));
    let _signal_handler = SignalHandler::setup(Arc::clone(&shutdown), wake.notifier())?;
    let pool = ThreadPool::new(
        config.max_connections(),
        Arc::clone(&server),
        Arc::clone(&shutdown),
    )?;
    info!(
        socket = %socket_path.display(),
        pid = std::process::id(),
        workers = config.max_connections(),
        "Daemon started"
    );

    run_accept_loop(&listener, &wake, &pool, &shutdown);

    info!("Shutting down daemon...");
    drop(listener);
    wait_for_connections(&server, DRAIN_TIMEOUT);
    cleanup(&socket_path, &lock_path, &server, pool);
    Ok(())
}
