//! Register and snapshot operations exposed to callers.
//!
//! `handle_register` decodes a pid from raw bytes and registers it;
//! `handle_snapshot` renders the registry as `"<pid>: <cpu_time>"` lines.

use std::fmt::Write as FmtWrite;
use tracing::debug;

use crate::error::{ParsePidError, RegisterError};
use crate::registry::{MonitoredEntry, Registry};

/// Default upper bound on register input; longer input is truncated.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024;

/// Parses a pid with automatic base detection.
///
/// Accepts an optional sign followed by decimal digits, `0x`/`0X` hex or
/// leading-`0` octal. Surrounding ASCII whitespace is ignored.
pub fn parse_pid(raw: &[u8]) -> Result<i32, ParsePidError> {
    let text = std::str::from_utf8(raw).map_err(|_| ParsePidError::NotUtf8)?;
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if text.is_empty() {
        return Err(ParsePidError::Empty);
    }

    let (negative, unsigned) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(ParsePidError::InvalidDigit(text.to_string()));
    }

    let magnitude = i64::from_str_radix(digits, radix)
        .map_err(|_| ParsePidError::OutOfRange(text.to_string()))?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).map_err(|_| ParsePidError::OutOfRange(text.to_string()))
}

/// Registers the pid encoded in `raw`, returning the number of bytes consumed.
///
/// Input longer than `max_input_bytes` is truncated before parsing; the
/// truncated length is what gets reported as consumed.
pub fn handle_register(
    registry: &Registry,
    raw: &[u8],
    max_input_bytes: usize,
) -> Result<usize, RegisterError> {
    let consumed = raw.len().min(max_input_bytes);
    let pid = parse_pid(&raw[..consumed])?;
    registry.register(pid)?;
    debug!("Register request consumed {} byte(s) for pid {}", consumed, pid);
    Ok(consumed)
}

/// Formats entries as one `"<pid>: <cpu_time>"` line each.
pub fn format_snapshot(entries: &[MonitoredEntry]) -> String {
    let mut out = String::with_capacity(entries.len() * 16);
    for entry in entries {
        writeln!(out, "{}: {}", entry.pid, entry.cpu_time).ok();
    }
    out
}

pub fn handle_snapshot(registry: &Registry) -> String {
    format_snapshot(&registry.snapshot())
}
