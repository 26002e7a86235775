//! Filesystem roots and host constants used by the samplers.

use std::path::{Path, PathBuf};

/// Fallback when the host reports a non-positive clock tick rate.
const DEFAULT_CLOCK_TICKS: u64 = 100;

/// Where the samplers look for kernel data.
///
/// The defaults point at the live host. Containers that bind-mount the host
/// `/proc` elsewhere, and the tests, override the roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
    pub cgroup_root: PathBuf,
    pub clock_ticks_per_second: u64,
}

impl SamplerConfig {
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            clock_ticks_per_second: host_clock_ticks(),
        }
    }

    pub fn with_proc_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_root = path.into();
        self
    }

    pub fn with_sys_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.sys_root = path.into();
        self
    }

    pub fn with_cgroup_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.cgroup_root = path.into();
        self
    }

    /// Override the clock tick rate. Zero falls back to 100.
    pub fn with_clock_ticks(mut self, ticks: u64) -> Self {
        self.clock_ticks_per_second = if ticks > 0 { ticks } else { DEFAULT_CLOCK_TICKS };
        self
    }

    /// Path of a file under the proc root, e.g. `proc_file("stat")`.
    pub fn proc_file(&self, name: &str) -> PathBuf {
        self.proc_root.join(name)
    }

    /// `<sys_root>/class/hwmon`
    pub fn hwmon_root(&self) -> PathBuf {
        self.sys_root.join("class").join("hwmon")
    }

    pub fn cgroup_root(&self) -> &Path {
        &self.cgroup_root
    }

    /// Milliseconds represented by one scheduler clock tick.
    pub fn ms_per_tick(&self) -> f64 {
        1000.0 / self.clock_ticks_per_second as f64
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn host_clock_ticks() -> u64 {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as u64
    } else {
        DEFAULT_CLOCK_TICKS
    }
}
