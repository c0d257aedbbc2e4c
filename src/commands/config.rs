//! Config command implementation.
//!
//! Writes a default configuration file in YAML, JSON or TOML.

use anyhow::Result;
use herakles_proc_cpu_tracker::config::Config;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;

/// Generates configuration files. An output of `-` prints to stdout.
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> Result<()> {
    let content = render_default_config(&format, commented)?;
    let output = output.unwrap_or_else(|| match format {
        ConfigFormat::Json => PathBuf::from("herakles-proc-cpu-tracker.json"),
        ConfigFormat::Toml => PathBuf::from("herakles-proc-cpu-tracker.toml"),
        ConfigFormat::Yaml => PathBuf::from("herakles-proc-cpu-tracker.yaml"),
    });

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

pub fn render_default_config(format: &ConfigFormat, commented: bool) -> Result<String> {
    let config = Config::default();
    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => {
            let content = serde_yaml::to_string(&config)?;
            if commented {
                add_config_comments(content)
            } else {
                content
            }
        }
    };
    Ok(content)
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Process CPU Tracker Configuration
# ==========================================
#
# Server Configuration
# --------------------
# bind: "127.0.0.1"            # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
#
# Tracking
# --------
# refresh_interval_secs: 5     # Seconds between refresh passes
# max_input_bytes: 1024        # Registration input is truncated to this size
# dedup_registrations: false   # true = registering a tracked pid again is a no-op
# proc_root: "/proc"           # Where /proc/<pid>/stat is read from
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
# enable_telemetry: true       # Enable /metrics endpoint
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_proc_cpu_tracker::config::parse_config;

    #[test]
    fn test_rendered_configs_parse_back() {
        for (format, ext) in [
            (ConfigFormat::Yaml, "yaml"),
            (ConfigFormat::Json, "json"),
            (ConfigFormat::Toml, "toml"),
        ] {
            let text = render_default_config(&format, true).unwrap();
            let parsed = parse_config(&text, Some(ext)).unwrap();
            assert_eq!(parsed, Config::default());
        }
    }

    #[test]
    fn test_commented_yaml_has_header() {
        let text = render_default_config(&ConfigFormat::Yaml, true).unwrap();
        assert!(text.starts_with("# Herakles Process CPU Tracker Configuration"));
    }
}
