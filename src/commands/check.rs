//! Check command implementation.
//!
//! Validates the configuration and that CPU time can be read from the
//! configured proc root.

use anyhow::{bail, Result};
use herakles_proc_cpu_tracker::config::{validate_effective_config, Config};
use herakles_proc_cpu_tracker::oracle::{CpuTimeOracle, ProcStatOracle, CLOCK_TICKS_PER_SECOND};
use std::fs;
use std::io::{self, Write};

/// Validates system requirements and configuration.
pub fn command_check(proc: bool, all: bool, config: &Config) -> Result<()> {
    let stdout = io::stdout();
    run_check(proc, all, config, &mut stdout.lock())
}

fn run_check<W: Write>(proc: bool, all: bool, config: &Config, out: &mut W) -> Result<()> {
    writeln!(out, "🔍 Herakles Process CPU Tracker - System Check")?;
    writeln!(out, "==============================================")?;

    let mut all_ok = true;
    let proc_root = config.proc_root();

    if proc || all {
        writeln!(out, "\n📁 Checking {} filesystem...", proc_root.display())?;
        match fs::read_dir(&proc_root) {
            Ok(entries) => {
                let pids = entries
                    .flatten()
                    .filter(|e| {
                        e.file_name()
                            .to_str()
                            .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
                    })
                    .count();
                writeln!(
                    out,
                    "   ✅ {} readable, {} process entries",
                    proc_root.display(),
                    pids
                )?;
            }
            Err(e) => {
                writeln!(out, "   ❌ Cannot read {}: {}", proc_root.display(), e)?;
                all_ok = false;
            }
        }

        writeln!(out, "\n⏱️  Checking CPU-time sampling...")?;
        let oracle = ProcStatOracle::new(&proc_root);
        let own_pid = std::process::id() as i32;
        match oracle.sample(own_pid) {
            Ok(ticks) => writeln!(out, "   ✅ Own process {} has used {} ticks", own_pid, ticks)?,
            Err(e) => {
                writeln!(out, "   ❌ Sampling own process failed: {}", e)?;
                all_ok = false;
            }
        }
        writeln!(out, "   ℹ️  Clock ticks per second: {}", *CLOCK_TICKS_PER_SECOND)?;
    }

    writeln!(out, "\n⚙️  Checking configuration...")?;
    match validate_effective_config(config) {
        Ok(()) => writeln!(out, "   ✅ Configuration is valid")?,
        Err(e) => {
            writeln!(out, "   ❌ {}", e)?;
            all_ok = false;
        }
    }

    writeln!(out, "\n📋 Summary:")?;
    if all_ok {
        writeln!(out, "   ✅ All checks passed - system is ready")?;
        Ok(())
    } else {
        bail!("Some checks failed - please review the output above")
    }
}
