//! Sample command implementation.
//!
//! Runs the /proc oracle against one pid, without the registry or trigger.

use anyhow::Result;
use herakles_proc_cpu_tracker::config::Config;
use herakles_proc_cpu_tracker::oracle::{ticks_to_seconds, CpuTimeOracle, ProcStatOracle};
use herakles_proc_cpu_tracker::SampleError;
use std::io::{self, Write};
use std::time::Duration;

/// Samples `pid` `iterations` times and prints each reading.
pub fn command_sample(pid: i32, iterations: usize, interval_ms: u64, config: &Config) -> Result<()> {
    let oracle = ProcStatOracle::new(config.proc_root());
    let stdout = io::stdout();
    run_sample(
        &oracle,
        pid,
        iterations,
        Duration::from_millis(interval_ms),
        &mut stdout.lock(),
    )
}

/// Writes one `pid: ticks (seconds)` line per iteration. Stops early once the
/// process is gone; transient failures are reported and sampling continues.
fn run_sample<W: Write>(
    oracle: &dyn CpuTimeOracle,
    pid: i32,
    iterations: usize,
    interval: Duration,
    out: &mut W,
) -> Result<()> {
    let iterations = iterations.max(1);

    for i in 0..iterations {
        match oracle.sample(pid) {
            Ok(ticks) => writeln!(out, "{}: {} ({:.2}s)", pid, ticks, ticks_to_seconds(ticks))?,
            Err(SampleError::NotFound(_)) => {
                writeln!(out, "{}: process not found", pid)?;
                return Ok(());
            }
            Err(e) => writeln!(out, "{}: sample failed: {}", pid, e)?,
        }

        if i + 1 < iterations {
            std::thread::sleep(interval);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_proc_cpu_tracker::oracle::CLOCK_TICKS_PER_SECOND;
    use std::fs;

    fn fake_proc(entries: &[(i32, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (pid, stat) in entries {
            let pid_dir = dir.path().join(pid.to_string());
            fs::create_dir_all(&pid_dir).unwrap();
            fs::write(pid_dir.join("stat"), stat).unwrap();
        }
        dir
    }

    fn sample_lines(root: &tempfile::TempDir, pid: i32, iterations: usize) -> Vec<String> {
        let oracle = ProcStatOracle::new(root.path());
        let mut out = Vec::new();
        run_sample(&oracle, pid, iterations, Duration::ZERO, &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_sample_prints_ticks_and_seconds_each_iteration() {
        let ticks = *CLOCK_TICKS_PER_SECOND;
        let stat = format!(
            "300 (worker) S 1 300 300 0 -1 0 0 0 0 0 {} {} 0 0 20 0 1 0 10 0 0",
            ticks, ticks
        );
        let root = fake_proc(&[(300, stat.as_str())]);

        let lines = sample_lines(&root, 300, 3);
        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert_eq!(line, &format!("300: {} (2.00s)", ticks * 2));
        }
    }

    #[test]
    fn test_sample_stops_when_process_is_gone() {
        let root = fake_proc(&[]);
        assert_eq!(sample_lines(&root, 404, 5), vec!["404: process not found"]);
    }

    #[test]
    fn test_sample_continues_after_transient_failure() {
        let root = fake_proc(&[(55, "garbage")]);
        let lines = sample_lines(&root, 55, 3);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.starts_with("55: sample failed:")));
    }

    #[test]
    fn test_sample_zero_iterations_samples_once() {
        let root = fake_proc(&[]);
        assert_eq!(sample_lines(&root, 9, 0).len(), 1);
    }
}
