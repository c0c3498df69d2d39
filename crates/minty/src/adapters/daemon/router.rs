use super::handlers;
use super::usecase_container::UseCaseContainer;
use crate::adapters::rpc::{RpcRequest, RpcResponse};
use crate::usecases::ports::{CommandRunner, DirectoryStore, SessionRepository};

/// Methods answered with a stream of frames instead of a single response.
pub const STREAMING_METHODS: &[&str] = &["subscribe"];

pub struct Router<'a, R, D, C>
where
    R: SessionRepository + 'static,
    D: DirectoryStore + 'static,
    C: CommandRunner + 'static,
{
    usecases: &'a UseCaseContainer<R, D, C>,
}

impl<'a, R, D, C> Router<'a, R, D, C>
where
    R: SessionRepository + 'static,
    D: DirectoryStore + 'static,
    C: CommandRunner + 'static,
{
    pub fn new(usecases: &'a UseCaseContainer<R, D, C>) -> Self {
        Self { usecases }
    }

    pub fn route(&self, request: RpcRequest) -> RpcResponse {
        let session = &self.usecases.session;
        let exec = &self.usecases.exec;
        let system = &self.usecases.system;
        let windows = &self.usecases.windows;
        let library = &self.usecases.library;

        match request.method.as_str() {
            "ping" => handlers::system::handle_ping(request),
            "health" => handlers::system::handle_health(&system.health, request),
            "shutdown" => handlers::system::handle_shutdown(&system.shutdown, request),
            "system_info" => handlers::system::handle_system_info(&system.info, request),

            "session_create" => handlers::session::handle_create(&session.create, request),
            "session_remove" => handlers::session::handle_remove(&session.remove, request),
            "session_write" => handlers::session::handle_write(&session.write, request, false),
            "session_write_line" => {
                handlers::session::handle_write(&session.write, request, true)
            }
            "session_resize" => handlers::session::handle_resize(&session.resize, request),
            "session_signal" => handlers::session::handle_signal(&session.signal, request),
            "session_info" => handlers::session::handle_info(&session.info, request),
            "session_os_cwd" => handlers::session::handle_os_cwd(&session.info, request),
            "sessions" => handlers::session::handle_sessions(&session.sessions, request),

            "execute" => handlers::exec::handle_execute(&exec.execute, request),
            "commands_list" => handlers::exec::handle_commands_list(exec, request),
            "command_exists" => handlers::exec::handle_command_exists(exec, request),
            "cwd_get" => handlers::exec::handle_cwd_get(&exec.tracked_dir, request),
            "cwd_set" => handlers::exec::handle_cwd_set(&exec.tracked_dir, request),
            "home_dir" => handlers::exec::handle_home_dir(exec, request),

            "window_create" => handlers::window::handle_window_create(windows, request),
            "window_close" => handlers::window::handle_window_close(windows, request),
            "windows" => handlers::window::handle_windows(windows, request),

            "library_save" => handlers::library::handle_library_save(library, request),
            "library_load_all" => handlers::library::handle_library_load_all(library, request),
            "library_load" => handlers::library::handle_library_load(library, request),
            "library_delete" => handlers::library::handle_library_delete(library, request),

            "index_run" => handlers::index::handle_index_run(&self.usecases.indexer, request),
            "index_context" => handlers::index::handle_index_context(request),

            _ => RpcResponse::method_not_found(request.id, &request.method),
        }
    }
}
