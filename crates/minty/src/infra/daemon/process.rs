//! OS-level view of a shell process.

use std::path::PathBuf;

use sysinfo::Pid;
use sysinfo::ProcessRefreshKind;
use sysinfo::ProcessesToUpdate;
use sysinfo::System;
use sysinfo::UpdateKind;

/// Best-effort working directory of `pid`.
///
/// The shell's own cwd drifts from the tracked directory whenever the user
/// types `cd` interactively; this is only ever reported, never stored.
pub fn process_cwd(pid: u32) -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(path) = std::fs::read_link(format!("/proc/{pid}/cwd")) {
            return Some(path);
        }
    }

    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_cwd(UpdateKind::Always),
    );
    system.process(pid)?.cwd().map(PathBuf::from)
}
