//! CLI command implementations for herakles-proc-cpu-tracker.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `sample`: Direct CPU-time sampling of one process

pub mod check;
pub mod config;
pub mod sample;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use sample::command_sample;
