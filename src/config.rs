//! Configuration file handling.
//!
//! Every field is optional; unset fields fall back to the defaults below.
//! Files are YAML unless the extension says `.json` or `.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;
use crate::interface::DEFAULT_MAX_INPUT_BYTES;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Accepted values for `log_level`.
pub const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Largest accepted `max_input_bytes`.
const MAX_INPUT_BYTES_LIMIT: usize = 64 * 1024;

/// Locations probed when no config file is given explicitly.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/herakles/proc-cpu-tracker.yaml",
    "/etc/herakles/proc-cpu-tracker.yml",
    "/etc/herakles/proc-cpu-tracker.json",
    "/etc/herakles/proc-cpu-tracker.toml",
    "./herakles-proc-cpu-tracker.yaml",
    "./herakles-proc-cpu-tracker.yml",
    "./herakles-proc-cpu-tracker.json",
    "./herakles-proc-cpu-tracker.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Tracking
    #[serde(alias = "refresh-interval-secs")]
    pub refresh_interval_secs: Option<u64>,
    #[serde(alias = "max-input-bytes")]
    pub max_input_bytes: Option<usize>,
    #[serde(alias = "dedup-registrations")]
    pub dedup_registrations: Option<bool>,
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            refresh_interval_secs: Some(DEFAULT_REFRESH_INTERVAL_SECS),
            max_input_bytes: Some(DEFAULT_MAX_INPUT_BYTES),
            dedup_registrations: Some(false),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval_secs
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
        )
    }

    pub fn max_input_bytes(&self) -> usize {
        self.max_input_bytes.unwrap_or(DEFAULT_MAX_INPUT_BYTES)
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn bind_addr(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Validates effective config (used by --check-config and at startup).
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.refresh_interval_secs == Some(0) {
        return Err(ConfigError::Invalid(
            "refresh_interval_secs must be greater than 0".into(),
        ));
    }

    match cfg.max_input_bytes {
        Some(0) => {
            return Err(ConfigError::Invalid(
                "max_input_bytes must be greater than 0".into(),
            ))
        }
        Some(n) if n > MAX_INPUT_BYTES_LIMIT => {
            return Err(ConfigError::Invalid(format!(
                "max_input_bytes {} exceeds the limit of {}",
                n, MAX_INPUT_BYTES_LIMIT
            )))
        }
        _ => {}
    }

    if let Some(root) = &cfg.proc_root {
        if root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("proc_root must not be empty".into()));
        }
    }

    if let Some(level) = &cfg.log_level {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "log_level '{}' is not one of {}",
                level,
                LOG_LEVELS.join(", ")
            )));
        }
    }

    if let Some(bind) = &cfg.bind {
        bind.parse::<std::net::IpAddr>().map_err(|e| {
            ConfigError::Invalid(format!("bind address '{}' is invalid: {}", bind, e))
        })?;
    }

    Ok(())
}

/// Loads configuration from `path`, or from the first default location that
/// exists. Falls back to `Config::default()` when no file is found.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
        {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let display = path.display().to_string();
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;

    let config = parse_config(&content, path.extension().and_then(|s| s.to_str()))
        .map_err(|reason| ConfigError::Parse {
            path: display.clone(),
            reason,
        })?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config text in the format named by `extension` (YAML by default).
pub fn parse_config(content: &str, extension: Option<&str>) -> Result<Config, String> {
    match extension {
        Some("json") => serde_json::from_str(content).map_err(|e| e.to_string()),
        Some("toml") => toml::from_str(content).map_err(|e| e.to_string()),
        _ => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_ok());
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(5));
        assert_eq!(cfg.max_input_bytes(), 1024);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cfg = Config {
            refresh_interval_secs: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            max_input_bytes: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            max_input_bytes: Some(1 << 20),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            bind: Some("not-an-ip".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            log_level: Some("verbose".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            log_level: Some("DEBUG".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn test_parse_yaml_with_aliases() {
        let yaml = "port: 9300\nrefresh-interval-secs: 2\ndedup_registrations: true\n";
        let cfg = parse_config(yaml, Some("yaml")).unwrap();
        assert_eq!(cfg.port, Some(9300));
        assert_eq!(cfg.refresh_interval_secs, Some(2));
        assert_eq!(cfg.dedup_registrations, Some(true));
        assert_eq!(cfg.bind, None);
    }

    #[test]
    fn test_parse_json_and_toml() {
        let cfg = parse_config(r#"{"max_input_bytes": 64}"#, Some("json")).unwrap();
        assert_eq!(cfg.max_input_bytes(), 64);

        let cfg = parse_config("proc_root = \"/host/proc\"\n", Some("toml")).unwrap();
        assert_eq!(cfg.proc_root(), PathBuf::from("/host/proc"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.yaml");
        fs::write(&path, "bind: 0.0.0.0\nenable_health: false\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0");
        assert_eq!(cfg.enable_health, Some(false));
    }

    #[test]
    fn test_load_config_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_config_bad_content_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
