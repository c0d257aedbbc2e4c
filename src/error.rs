//! Error types for the tracker library.
//!
//! Registration errors are surfaced to callers. Oracle errors never leave the
//! refresh pass: `NotFound` prunes the entry, `Transient` leaves it unchanged.

use std::collections::TryReserveError;
use thiserror::Error;

/// Failure to interpret register input as a process id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsePidError {
    #[error("input is empty")]
    Empty,
    #[error("input is not valid UTF-8")]
    NotUtf8,
    #[error("invalid digit in {0:?}")]
    InvalidDigit(String),
    #[error("value {0:?} does not fit a process id")]
    OutOfRange(String),
}

/// Errors returned by the register path.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("failed to parse process id: {0}")]
    Parse(#[from] ParsePidError),
    #[error("failed to allocate registry entry: {0}")]
    Allocation(#[from] TryReserveError),
}

/// Outcome of a failed CPU-time sample.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The process no longer exists.
    #[error("process {0} not found")]
    NotFound(i32),
    /// Sampling failed this time; retry on the next refresh.
    #[error("transient failure sampling process {pid}: {reason}")]
    Transient { pid: i32, reason: String },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
