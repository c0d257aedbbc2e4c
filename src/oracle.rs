//! CPU-time sampling from the /proc filesystem.
//!
//! This module provides the `CpuTimeOracle` seam used by the refresh pass and
//! its Linux implementation, which reads utime + stime from `/proc/<pid>/stat`.

use once_cell::sync::Lazy;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SampleError;

/// Fallback used when `sysconf(_SC_CLK_TCK)` is unavailable.
const DEFAULT_CLOCK_TICKS: u64 = 100;

/// Clock ticks per second as reported by the kernel.
pub static CLOCK_TICKS_PER_SECOND: Lazy<u64> = Lazy::new(|| {
    // SAFETY: sysconf has no preconditions and only reads system configuration.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as u64
    } else {
        DEFAULT_CLOCK_TICKS
    }
});

/// Converts clock ticks to seconds.
pub fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / *CLOCK_TICKS_PER_SECOND as f64
}

/// Source of accumulated CPU time for a process.
///
/// Implementations must be cheap to call relative to the refresh period; the
/// refresh pass calls `sample` once per registered entry while holding the
/// registry lock.
pub trait CpuTimeOracle: Send + Sync {
    /// Returns the accumulated CPU time of `pid` in clock ticks.
    fn sample(&self, pid: i32) -> Result<u64, SampleError>;
}

/// Oracle backed by `<proc_root>/<pid>/stat`.
#[derive(Debug, Clone)]
pub struct ProcStatOracle {
    proc_root: PathBuf,
}

impl ProcStatOracle {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}

impl Default for ProcStatOracle {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl CpuTimeOracle for ProcStatOracle {
    fn sample(&self, pid: i32) -> Result<u64, SampleError> {
        if pid <= 0 {
            return Err(SampleError::NotFound(pid));
        }

        let stat_path = self.proc_root.join(pid.to_string()).join("stat");
        let content = match fs::read_to_string(&stat_path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound || e.raw_os_error() == Some(libc::ESRCH) => {
                debug!("Process {} is gone: {}", pid, e);
                return Err(SampleError::NotFound(pid));
            }
            Err(e) => {
                return Err(SampleError::Transient {
                    pid,
                    reason: format!("Failed to read {}: {}", stat_path.display(), e),
                })
            }
        };

        parse_stat_cpu_ticks(&content).map_err(|reason| SampleError::Transient { pid, reason })
    }
}

/// Parses utime + stime (clock ticks) from the content of `/proc/<pid>/stat`.
///
/// The `comm` field may contain spaces and parentheses, so fields are counted
/// from the last `)`. After it come `state` (field 3) ... `utime` (14) and
/// `stime` (15).
pub fn parse_stat_cpu_ticks(content: &str) -> Result<u64, String> {
    let comm_end = content
        .rfind(')')
        .ok_or_else(|| "Invalid stat format: missing comm terminator".to_string())?;

    let rest: Vec<&str> = content[comm_end + 1..].split_whitespace().collect();
    if rest.len() < 13 {
        return Err(format!(
            "Invalid stat format: expected at least 13 fields after comm, got {}",
            rest.len()
        ));
    }

    let utime: u64 = rest[11]
        .parse()
        .map_err(|e| format!("Failed to parse utime {:?}: {}", rest[11], e))?;
    let stime: u64 = rest[12]
        .parse()
        .map_err(|e| format!("Failed to parse stime {:?}: {}", rest[12], e))?;

    Ok(utime.saturating_add(stime))
}
