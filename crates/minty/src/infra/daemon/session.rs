//! Live PTY sessions and the pumps that move their output to windows.
//!
//! Lifecycle of one id: `absent -> spawning -> active -> (exited | removed)
//! -> absent`. Every spawn gets a fresh generation number; the route, the
//! table entry and the pump all carry it, so anything belonging to an older
//! generation of the same id is ignored instead of clobbering the new one.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use chrono::DateTime;
use chrono::Utc;
use crossbeam_channel as channel;
use tracing::{debug, info, trace, warn};

use super::directory::DirectoryTracker;
use super::journal::{JournalRecord, SessionJournal};
use super::output_router::OutputRouter;
use crate::common::{mutex_lock_or_recover, rwlock_read_or_recover, rwlock_write_or_recover};
use crate::domain::{PushEvent, SessionId, SessionInfo, TerminalSize, WindowId};
use crate::infra::terminal::{PtyError, PtyHandle, ReadEvent, ShellEnvironment, SpawnSpec};
use crate::infra::terminal::UNKNOWN_EXIT_CODE;
use crate::usecases::ports::{CreateSession, CreatedSession, SessionError, SessionRepository};

const PUMP_COMMAND_CAPACITY: usize = 4;
const TRAILING_OUTPUT_GRACE: Duration = Duration::from_millis(100);

enum PumpCommand {
    Start,
    Shutdown,
}

pub struct Session {
    id: SessionId,
    generation: u64,
    pty: PtyHandle,
    shell: String,
    owner: Option<WindowId>,
    created_at: DateTime<Utc>,
    pump_tx: Option<channel::Sender<PumpCommand>>,
    pump_join: Option<thread::JoinHandle<()>>,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn size(&self) -> TerminalSize {
        self.pty.size()
    }

    pub fn is_running(&self) -> bool {
        self.pty.is_running()
    }

    fn info(&self) -> SessionInfo {
        let size = self.pty.size();
        SessionInfo {
            id: self.id.clone(),
            pid: self.pty.pid(),
            cols: size.cols(),
            rows: size.rows(),
            running: self.pty.is_running(),
            shell: self.shell.clone(),
            window: self.owner.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }

    /// Stops the pump and kills the shell. The returned handle must be
    /// joined after the session lock is released.
    fn stop(&mut self) -> Option<thread::JoinHandle<()>> {
        if let Some(tx) = self.pump_tx.take() {
            let _ = tx.send(PumpCommand::Shutdown);
        }
        if let Err(e) = self.pty.kill() {
            warn!(session_id = %self.id, error = %e, "Failed to kill session process");
        }
        self.pump_join.take()
    }
}

/// Id -> session table shared between the registry and its pumps.
#[derive(Default)]
struct SessionTable {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionTable {
    fn get(&self, id: &SessionId) -> Option<Arc<Mutex<Session>>> {
        rwlock_read_or_recover(&self.sessions).get(id).cloned()
    }

    fn insert(&self, id: SessionId, session: Arc<Mutex<Session>>) {
        rwlock_write_or_recover(&self.sessions).insert(id, session);
    }

    fn take(&self, id: &SessionId) -> Option<Arc<Mutex<Session>>> {
        rwlock_write_or_recover(&self.sessions).remove(id)
    }

    fn take_all(&self) -> Vec<Arc<Mutex<Session>>> {
        rwlock_write_or_recover(&self.sessions)
            .drain()
            .map(|(_, session)| session)
            .collect()
    }

    fn contains(&self, id: &SessionId) -> bool {
        rwlock_read_or_recover(&self.sessions).contains_key(id)
    }

    fn len(&self) -> usize {
        rwlock_read_or_recover(&self.sessions).len()
    }

    fn snapshot(&self) -> Vec<Arc<Mutex<Session>>> {
        rwlock_read_or_recover(&self.sessions)
            .values()
            .cloned()
            .collect()
    }

    /// Removes the entry only if it still holds `generation`.
    fn purge_if_current(&self, id: &SessionId, generation: u64) -> Option<Arc<Mutex<Session>>> {
        let mut sessions = rwlock_write_or_recover(&self.sessions);
        let current = sessions
            .get(id)
            .map(|session| mutex_lock_or_recover(session).generation)?;
        if current == generation {
            sessions.remove(id)
        } else {
            None
        }
    }
}

/// Everything a pump needs once it is detached from the registry.
struct PumpContext {
    id: SessionId,
    generation: u64,
    table: Arc<SessionTable>,
    router: Arc<OutputRouter>,
    journal: Option<Arc<SessionJournal>>,
}

pub struct SessionRegistry {
    shell_env: Arc<ShellEnvironment>,
    router: Arc<OutputRouter>,
    directories: Arc<DirectoryTracker>,
    journal: Option<Arc<SessionJournal>>,
    table: Arc<SessionTable>,
    pending: Mutex<HashMap<SessionId, u64>>,
    next_generation: AtomicU64,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(
        shell_env: Arc<ShellEnvironment>,
        router: Arc<OutputRouter>,
        directories: Arc<DirectoryTracker>,
        max_sessions: usize,
    ) -> Self {
        Self {
            shell_env,
            router,
            directories,
            journal: None,
            table: Arc::new(SessionTable::default()),
            pending: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn with_journal(mut self, journal: Arc<SessionJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn router(&self) -> &Arc<OutputRouter> {
        &self.router
    }

    pub fn directories(&self) -> &Arc<DirectoryTracker> {
        &self.directories
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Generation of the live session with this id, if any.
    pub fn generation_of(&self, id: &SessionId) -> Option<u64> {
        self.table
            .get(id)
            .map(|session| mutex_lock_or_recover(&session).generation)
    }

    fn get(&self, id: &SessionId) -> Result<Arc<Mutex<Session>>, SessionError> {
        self.table
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Takes the live session out of every table and waits for its pump.
    fn teardown(&self, id: &SessionId) -> bool {
        let Some(session) = self.table.take(id) else {
            return false;
        };
        let join = {
            let mut sess = mutex_lock_or_recover(&session);
            self.router.unregister(id, sess.generation);
            sess.stop()
        };
        if let Some(join) = join {
            if join.join().is_err() {
                warn!(session_id = %id, "Session pump panicked");
            }
        }
        self.forget_in_journal(id);
        true
    }

    fn forget_in_journal(&self, id: &SessionId) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.forget(id.as_str()) {
                warn!(session_id = %id, error = %e, "Failed to update session journal");
            }
        }
    }

    fn spawn_pty(&self, cwd: &Path) -> Result<PtyHandle, SessionError> {
        PtyHandle::spawn(SpawnSpec {
            program: self.shell_env.shell(),
            args: &[],
            cwd,
            env: self.shell_env.env(),
            size: TerminalSize::INITIAL,
        })
        .map_err(|e| terminal_error("spawn", &e))
    }
}

fn terminal_error(operation: &'static str, err: &PtyError) -> SessionError {
    SessionError::Terminal {
        operation,
        reason: err.to_string(),
        code: err.code(),
    }
}

impl SessionRepository for SessionRegistry {
    #[tracing::instrument(skip(self, request), fields(session_id = %request.id, cwd = %request.cwd.display()))]
    fn create(&self, request: CreateSession) -> Result<CreatedSession, SessionError> {
        let id = request.id;
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        mutex_lock_or_recover(&self.pending).insert(id.clone(), generation);

        // The old process goes first, even when the new one cannot start.
        if self.teardown(&id) {
            self.directories.remove(&id);
            debug!(session_id = %id, "Replaced existing session");
        }

        if !request.cwd.is_dir() {
            release_pending(&self.pending, &id, generation);
            return Err(SessionError::InvalidDirectory(
                request.cwd.to_string_lossy().into_owned(),
            ));
        }

        if self.table.len() >= self.max_sessions {
            release_pending(&self.pending, &id, generation);
            return Err(SessionError::LimitReached(self.max_sessions));
        }

        let mut pty = match self.spawn_pty(&request.cwd) {
            Ok(pty) => pty,
            Err(e) => {
                release_pending(&self.pending, &id, generation);
                return Err(e);
            }
        };
        let pid = pty.pid();
        let Some((read_rx, exit_rx)) = pty.take_events() else {
            release_pending(&self.pending, &id, generation);
            return Err(SessionError::Terminal {
                operation: "spawn",
                reason: "PTY event channels already taken".to_string(),
                code: crate::common::error_codes::PTY_ERROR,
            });
        };

        let (pump_tx, pump_rx) = channel::bounded(PUMP_COMMAND_CAPACITY);
        let context = PumpContext {
            id: id.clone(),
            generation,
            table: Arc::clone(&self.table),
            router: Arc::clone(&self.router),
            journal: self.journal.clone(),
        };
        let pump_join = spawn_pump(context, read_rx, exit_rx, pump_rx);

        let created_at = Utc::now();
        let session = Session {
            id: id.clone(),
            generation,
            pty,
            shell: self.shell_env.shell().to_string(),
            owner: request.owner.clone(),
            created_at,
            pump_tx: Some(pump_tx.clone()),
            pump_join,
        };
        let cwd = request.cwd.to_string_lossy().into_owned();

        {
            let mut pending = mutex_lock_or_recover(&self.pending);
            let still_ours = pending.get(&id) == Some(&generation);
            let over_limit = self.table.len() >= self.max_sessions && !self.table.contains(&id);
            if !still_ours || over_limit {
                if still_ours {
                    pending.remove(&id);
                }
                drop(pending);
                let mut session = session;
                if let Some(join) = session.stop() {
                    let _ = join.join();
                }
                return Err(if over_limit && still_ours {
                    SessionError::LimitReached(self.max_sessions)
                } else {
                    debug!(session_id = %id, generation, "Create superseded before commit");
                    SessionError::Superseded(id)
                });
            }
            pending.remove(&id);
            self.router.register(&id, generation, request.owner.clone());
            self.directories.init(&id, cwd.clone());
            self.table.insert(id.clone(), Arc::new(Mutex::new(session)));
            let _ = pump_tx.send(PumpCommand::Start);
        }

        if let Some(journal) = &self.journal {
            let record = JournalRecord {
                session_id: id.to_string(),
                pid: pid.unwrap_or(0),
                shell: self.shell_env.shell().to_string(),
                cwd: cwd.clone(),
                created_at: created_at.to_rfc3339(),
            };
            if let Err(e) = journal.record(record) {
                warn!(session_id = %id, error = %e, "Failed to record session in journal");
            }
        }

        self.router.notify(
            &id,
            request.owner,
            PushEvent::SessionCreated {
                session_id: id.clone(),
                cwd: cwd.clone(),
                title: request.title,
            },
        );

        info!(session_id = %id, pid = ?pid, generation, "Session created");
        Ok(CreatedSession { id, cwd, pid })
    }

    #[tracing::instrument(skip(self), fields(session_id = %id))]
    fn remove(&self, id: &SessionId) -> bool {
        mutex_lock_or_recover(&self.pending).remove(id);
        if self.teardown(id) {
            info!(session_id = %id, "Session removed");
        }
        self.directories.remove(id);
        true
    }

    fn write(&self, id: &SessionId, data: &[u8]) -> Result<(), SessionError> {
        let session = self.get(id)?;
        let sess = mutex_lock_or_recover(&session);
        sess.pty.write(data).map_err(|e| terminal_error("write", &e))
    }

    fn resize(&self, id: &SessionId, size: TerminalSize) -> Result<(), SessionError> {
        let session = self.get(id)?;
        let mut sess = mutex_lock_or_recover(&session);
        sess.pty
            .resize(size)
            .map_err(|e| terminal_error("resize", &e))
    }

    fn info(&self, id: &SessionId) -> Result<SessionInfo, SessionError> {
        let session = self.get(id)?;
        let sess = mutex_lock_or_recover(&session);
        Ok(sess.info())
    }

    fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<(u64, SessionInfo)> = self
            .table
            .snapshot()
            .iter()
            .map(|session| {
                let sess = mutex_lock_or_recover(session);
                (sess.generation, sess.info())
            })
            .collect();
        sessions.sort_by_key(|(generation, _)| *generation);
        sessions.into_iter().map(|(_, info)| info).collect()
    }

    fn session_count(&self) -> usize {
        self.table.len()
    }

    fn shutdown_all(&self) -> usize {
        mutex_lock_or_recover(&self.pending).clear();
        let sessions = self.table.take_all();
        let count = sessions.len();

        let joins: Vec<_> = sessions
            .iter()
            .filter_map(|session| {
                let mut sess = mutex_lock_or_recover(session);
                self.router.unregister(&sess.id, sess.generation);
                sess.stop()
            })
            .collect();
        for join in joins {
            let _ = join.join();
        }

        self.router.clear();
        self.directories.clear();
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.clear() {
                warn!(error = %e, "Failed to clear session journal");
            }
        }
        if count > 0 {
            info!(count, "Terminated all sessions");
        }
        count
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

fn release_pending(pending: &Mutex<HashMap<SessionId, u64>>, id: &SessionId, generation: u64) {
    let mut pending = mutex_lock_or_recover(pending);
    if pending.get(id) == Some(&generation) {
        pending.remove(id);
    }
}

fn spawn_pump(
    context: PumpContext,
    read_rx: channel::Receiver<ReadEvent>,
    exit_rx: channel::Receiver<i32>,
    cmd_rx: channel::Receiver<PumpCommand>,
) -> Option<thread::JoinHandle<()>> {
    let name = format!("session-pump-{}", context.id);
    let span = tracing::debug_span!("session_pump", session_id = %context.id, generation = context.generation);
    match thread::Builder::new().name(name).spawn(move || {
        let _guard = span.enter();
        match cmd_rx.recv() {
            Ok(PumpCommand::Start) => pump_loop(&context, &read_rx, &exit_rx, &cmd_rx),
            Ok(PumpCommand::Shutdown) | Err(_) => trace!("Pump cancelled before start"),
        }
    }) {
        Ok(join) => Some(join),
        Err(e) => {
            warn!(error = %e, "Failed to spawn session pump thread");
            None
        }
    }
}

fn pump_loop(
    context: &PumpContext,
    read_rx: &channel::Receiver<ReadEvent>,
    exit_rx: &channel::Receiver<i32>,
    cmd_rx: &channel::Receiver<PumpCommand>,
) {
    let closed_reads = channel::never::<ReadEvent>();
    let closed_exit = channel::never::<i32>();
    let mut reading = true;
    let mut waiting = true;

    let exit_code = loop {
        let reads = if reading { read_rx } else { &closed_reads };
        let exits = if waiting { exit_rx } else { &closed_exit };
        channel::select! {
            recv(cmd_rx) -> cmd => match cmd {
                Ok(PumpCommand::Start) => {}
                Ok(PumpCommand::Shutdown) | Err(_) => {
                    trace!("Pump shut down");
                    return;
                }
            },
            recv(reads) -> event => match event {
                Ok(ReadEvent::Data(data)) => route_output(context, data),
                Ok(ReadEvent::Eof) | Err(_) => {
                    reading = false;
                    if !waiting {
                        break UNKNOWN_EXIT_CODE;
                    }
                }
                Ok(ReadEvent::Error(reason)) => {
                    debug!(reason = %reason, "PTY read failed");
                    reading = false;
                    if !waiting {
                        break UNKNOWN_EXIT_CODE;
                    }
                }
            },
            recv(exits) -> code => match code {
                Ok(code) => break code,
                Err(_) => {
                    waiting = false;
                    if !reading {
                        break UNKNOWN_EXIT_CODE;
                    }
                }
            },
        }
    };

    if reading {
        drain_trailing_output(context, read_rx);
    }
    finish(context, exit_code);
}

fn route_output(context: &PumpContext, data: Vec<u8>) {
    context.router.route(
        &context.id,
        context.generation,
        PushEvent::Output {
            session_id: context.id.clone(),
            data: Bytes::from(data),
        },
    );
}

/// Output the shell wrote just before exiting can still be in flight.
fn drain_trailing_output(context: &PumpContext, read_rx: &channel::Receiver<ReadEvent>) {
    while let Ok(event) = read_rx.recv_timeout(TRAILING_OUTPUT_GRACE) {
        match event {
            ReadEvent::Data(data) => route_output(context, data),
            ReadEvent::Eof | ReadEvent::Error(_) => break,
        }
    }
}

fn finish(context: &PumpContext, exit_code: i32) {
    context.router.route(
        &context.id,
        context.generation,
        PushEvent::Exit {
            session_id: context.id.clone(),
            exit_code,
        },
    );

    // Nothing may be routed for this generation after the exit event.
    let purged = context.table.purge_if_current(&context.id, context.generation);
    context.router.unregister(&context.id, context.generation);
    if purged.is_some() {
        if let Some(journal) = &context.journal {
            if let Err(e) = journal.forget(context.id.as_str()) {
                warn!(error = %e, "Failed to update session journal");
            }
        }
        info!(exit_code, "Session exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::daemon::windows::{WindowKind, WindowRegistry};
    use std::path::PathBuf;
    use std::time::Instant;
    use tempfile::TempDir;

    struct Fixture {
        registry: SessionRegistry,
        windows: Arc<WindowRegistry>,
        cwd: PathBuf,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let cwd = dir.path().to_path_buf();
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        env.insert("SHELL".to_string(), "/bin/sh".to_string());
        let shell_env = ShellEnvironment::from_parts(env, cwd.clone(), "tester".to_string());
        let windows = Arc::new(WindowRegistry::new(256));
        let router = Arc::new(OutputRouter::new(Arc::clone(&windows)));
        let registry = SessionRegistry::new(
            Arc::new(shell_env),
            router,
            Arc::new(DirectoryTracker::new()),
            4,
        );
        Fixture {
            registry,
            windows,
            cwd,
            _dir: dir,
        }
    }

    fn id(s: &str) -> SessionId {
        SessionId::try_new(s).unwrap()
    }

    fn request(s: &str, cwd: &Path, owner: Option<WindowId>) -> CreateSession {
        CreateSession {
            id: id(s),
            cwd: cwd.to_path_buf(),
            owner,
            title: "t".to_string(),
        }
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        condition()
    }

    #[test]
    fn test_create_then_remove_leaves_nothing_behind() {
        let fx = fixture();
        let created = fx.registry.create(request("a", &fx.cwd, None)).unwrap();
        assert!(created.pid.is_some());
        assert_eq!(fx.registry.session_count(), 1);
        assert!(fx.registry.directories().contains(&id("a")));

        assert!(fx.registry.remove(&id("a")));
        assert!(fx.registry.remove(&id("a")));

        assert_eq!(fx.registry.session_count(), 0);
        assert!(fx.registry.directories().is_empty());
        assert!(matches!(
            fx.registry.write(&id("a"), b"echo hi\n"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_rejects_missing_directory() {
        let fx = fixture();
        let missing = fx.cwd.join("nope");
        let err = fx.registry.create(request("a", &missing, None)).unwrap_err();
        assert!(matches!(err, SessionError::InvalidDirectory(_)));
        assert_eq!(fx.registry.session_count(), 0);
    }

    fn pid_is_live(pid: u32) -> bool {
        let pid = libc::pid_t::try_from(pid).unwrap();
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[test]
    fn test_recreate_with_missing_directory_still_removes_old_session() {
        let fx = fixture();
        let old = fx.registry.create(request("a", &fx.cwd, None)).unwrap();
        let old_pid = old.pid.unwrap();

        let err = fx
            .registry
            .create(request("a", &fx.cwd.join("missing"), None))
            .unwrap_err();

        assert!(matches!(err, SessionError::InvalidDirectory(_)));
        assert!(matches!(
            fx.registry.info(&id("a")),
            Err(SessionError::NotFound(_))
        ));
        assert!(!fx.registry.directories().contains(&id("a")));
        assert!(wait_until(Duration::from_secs(2), || !pid_is_live(old_pid)));

        // The pending slot was released, so the id is usable again.
        fx.registry.create(request("a", &fx.cwd, None)).unwrap();
        assert_eq!(fx.registry.session_count(), 1);
    }

    /// Live processes whose working directory is `dir`; zombies have no cwd link.
    #[cfg(target_os = "linux")]
    fn processes_in(dir: &Path) -> Vec<u32> {
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .filter(|pid| {
                std::fs::read_link(format!("/proc/{pid}/cwd")).is_ok_and(|cwd| cwd == dir)
            })
            .collect()
    }

    #[test]
    fn test_remove_racing_create_keeps_tables_consistent() {
        let fx = fixture();
        let x = id("x");
        let mut superseded = 0;

        for round in 0..40u64 {
            let created = thread::scope(|scope| {
                let creating = scope.spawn(|| fx.registry.create(request("x", &fx.cwd, None)));
                thread::sleep(Duration::from_micros(round * 250));
                assert!(fx.registry.remove(&x));
                creating.join().unwrap()
            });

            let in_table = fx.registry.generation_of(&x).is_some();
            assert_eq!(in_table, fx.registry.directories().contains(&x));
            match created {
                Ok(_) => {}
                Err(SessionError::Superseded(_)) => {
                    superseded += 1;
                    assert!(!in_table);
                    assert_eq!(fx.registry.session_count(), 0);
                }
                Err(other) => panic!("unexpected create error: {other}"),
            }

            fx.registry.remove(&x);
            assert_eq!(fx.registry.session_count(), 0);
            assert!(fx.registry.directories().is_empty());
        }
        debug!(superseded, "Race rounds finished");

        #[cfg(target_os = "linux")]
        {
            let cwd = fx.cwd.canonicalize().unwrap();
            assert!(
                wait_until(Duration::from_secs(3), || processes_in(&cwd).is_empty()),
                "shells left running: {:?}",
                processes_in(&cwd)
            );
        }
    }

    #[test]
    fn test_recreate_replaces_process() {
        let fx = fixture();
        let first = fx.registry.create(request("a", &fx.cwd, None)).unwrap();
        let gen_first = fx.registry.generation_of(&id("a")).unwrap();
        let second = fx.registry.create(request("a", &fx.cwd, None)).unwrap();

        assert_ne!(first.pid, second.pid);
        assert!(fx.registry.generation_of(&id("a")).unwrap() > gen_first);
        assert_eq!(fx.registry.session_count(), 1);
    }

    #[test]
    fn test_limit_is_enforced() {
        let fx = fixture();
        for n in 0..4 {
            fx.registry
                .create(request(&format!("s{n}"), &fx.cwd, None))
                .unwrap();
        }
        let err = fx.registry.create(request("s4", &fx.cwd, None)).unwrap_err();
        assert!(matches!(err, SessionError::LimitReached(4)));
        assert_eq!(fx.registry.shutdown_all(), 4);
    }

    #[test]
    fn test_resize_round_trip() {
        let fx = fixture();
        fx.registry.create(request("a", &fx.cwd, None)).unwrap();
        let size = TerminalSize::try_new(80, 24).unwrap();

        fx.registry.resize(&id("a"), size).unwrap();

        let info = fx.registry.info(&id("a")).unwrap();
        assert_eq!((info.cols, info.rows), (80, 24));
        assert_eq!(info.shell, "/bin/sh");
    }

    #[test]
    fn test_output_and_single_exit_reach_owner() {
        let fx = fixture();
        let window = fx.windows.create("w".into(), WindowKind::Surface);
        let rx = fx.windows.attach(&window).unwrap();
        fx.registry
            .create(request("a", &fx.cwd, Some(window.clone())))
            .unwrap();

        fx.registry.write(&id("a"), b"echo marker-$((20+22)); exit 7\n").unwrap();

        let mut output = Vec::new();
        let mut exits = Vec::new();
        let mut created = 0;
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(5)) {
            match event {
                PushEvent::Output { data, .. } => output.extend_from_slice(&data),
                PushEvent::Exit { exit_code, .. } => exits.push(exit_code),
                PushEvent::SessionCreated { .. } => created += 1,
                PushEvent::TabsLoaded { .. } => {}
            }
            if !exits.is_empty() {
                break;
            }
        }
        assert_eq!(created, 1);
        assert!(String::from_utf8_lossy(&output).contains("marker-42"));
        assert_eq!(exits, vec![7]);
        assert!(wait_until(Duration::from_secs(2), || fx.registry.session_count() == 0));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        // Self-exit keeps the tracked directory until explicit removal.
        assert!(fx.registry.directories().contains(&id("a")));
    }

    #[test]
    fn test_removed_session_emits_no_exit() {
        let fx = fixture();
        let window = fx.windows.create("w".into(), WindowKind::Surface);
        let rx = fx.windows.attach(&window).unwrap();
        fx.registry
            .create(request("a", &fx.cwd, Some(window)))
            .unwrap();

        fx.registry.remove(&id("a"));

        let exits = rx
            .try_iter()
            .filter(|event| matches!(event, PushEvent::Exit { .. }))
            .count();
        assert_eq!(exits, 0);
    }

    #[test]
    fn test_list_is_in_creation_order() {
        let fx = fixture();
        for name in ["c", "a", "b"] {
            fx.registry.create(request(name, &fx.cwd, None)).unwrap();
        }
        let ids: Vec<String> = fx
            .registry
            .list()
            .into_iter()
            .map(|info| info.id.to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_shutdown_all_kills_everything() {
        let fx = fixture();
        let a = fx.registry.create(request("a", &fx.cwd, None)).unwrap();
        fx.registry.create(request("b", &fx.cwd, None)).unwrap();

        assert_eq!(fx.registry.shutdown_all(), 2);

        assert_eq!(fx.registry.session_count(), 0);
        let pid = libc::pid_t::try_from(a.pid.unwrap()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || unsafe {
            libc::kill(pid, 0) != 0
        }));
    }
}
