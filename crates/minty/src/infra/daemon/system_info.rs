//! Host facts reported by `system_info` and `health`.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use sysinfo::System;

use super::windows::WindowRegistry;
use crate::infra::terminal::ShellEnvironment;
use crate::usecases::ports::SystemInfoProvider;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub platform: String,
    pub arch: String,
    pub hostname: String,
    pub username: String,
    pub shell: String,
    pub home_dir: String,
    pub temp_dir: String,
}

impl SystemInfo {
    pub fn collect(shell_env: &ShellEnvironment) -> Self {
        Self {
            platform: platform_name(std::env::consts::OS).to_string(),
            arch: arch_name(std::env::consts::ARCH).to_string(),
            hostname: System::host_name().unwrap_or_else(|| "localhost".to_string()),
            username: shell_env.user().to_string(),
            shell: shell_env.shell().to_string(),
            home_dir: shell_env.home().to_string_lossy().into_owned(),
            temp_dir: std::env::temp_dir().to_string_lossy().into_owned(),
        }
    }
}

/// Platform names as desktop front ends conventionally spell them.
fn platform_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "ia32",
        other => other,
    }
}

pub struct Uptime {
    started: Instant,
}

impl Uptime {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn millis(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Live daemon facts behind `health`.
pub struct DaemonStatus {
    uptime: Uptime,
    windows: Arc<WindowRegistry>,
}

impl DaemonStatus {
    pub fn new(windows: Arc<WindowRegistry>) -> Self {
        Self {
            uptime: Uptime::start(),
            windows,
        }
    }
}

impl SystemInfoProvider for DaemonStatus {
    fn pid(&self) -> u32 {
        std::process::id()
    }

    fn uptime_ms(&self) -> u64 {
        self.uptime.millis()
    }

    fn version(&self) -> String {
        VERSION.to_string()
    }

    fn window_count(&self) -> usize {
        self.windows.len()
    }
}
