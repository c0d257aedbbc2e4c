//! herakles-proc-cpu-tracker library.
//!
//! Tracks accumulated CPU time for a changing set of processes. Callers
//! register pids into a lock-protected [`registry::Registry`]; a periodic
//! [`trigger::Trigger`] hands refresh passes to a [`refresh::RefreshQueue`]
//! that samples every entry through a [`oracle::CpuTimeOracle`] and prunes
//! processes that have exited. [`tracker::Tracker`] owns the lifecycle.

pub mod config;
pub mod error;
pub mod handlers;
pub mod health_stats;
pub mod interface;
pub mod metrics;
pub mod oracle;
pub mod refresh;
pub mod registry;
pub mod state;
pub mod tracker;
pub mod trigger;

pub use error::{ConfigError, ParsePidError, RegisterError, SampleError};
pub use interface::{handle_register, handle_snapshot};
pub use oracle::{CpuTimeOracle, ProcStatOracle};
pub use registry::{MonitoredEntry, RefreshOutcome, Registry};
pub use tracker::{StopReport, Tracker, TrackerOptions};
