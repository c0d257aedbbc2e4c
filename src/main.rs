// herakles-proc-cpu-tracker - version 0.1.0
// Per-process CPU time tracker with tracing logging
mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use herakles_proc_cpu_tracker::config::{load_config, validate_effective_config, Config};
use herakles_proc_cpu_tracker::handlers;
use herakles_proc_cpu_tracker::health_stats::HealthStats;
use herakles_proc_cpu_tracker::oracle::ProcStatOracle;
use herakles_proc_cpu_tracker::state::AppState;
use herakles_proc_cpu_tracker::{Tracker, TrackerOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{debug, info, Level};

use cli::{Args, Commands, ConfigFormat, LogLevel};

/// -------------------------------------------------------------------
/// CONFIGURATION MANAGEMENT
/// -------------------------------------------------------------------

/// Resolves configuration from CLI args, config file, and defaults.
/// Precedence: CLI (if provided) > config file > default.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        let mut loaded = load_config(args.config.as_deref())?;
        fill_defaults(&mut loaded);
        loaded
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(secs) = args.refresh_interval {
        config.refresh_interval_secs = Some(secs);
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(max) = args.max_input_bytes {
        config.max_input_bytes = Some(max);
    }
    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    // Feature flags
    if args.dedup {
        config.dedup_registrations = Some(true);
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    Ok(config)
}

/// Fills fields a config file left out with the defaults, so that
/// --show-config prints the effective values.
fn fill_defaults(config: &mut Config) {
    let defaults = Config::default();
    config.port = config.port.or(defaults.port);
    config.bind = config.bind.take().or(defaults.bind);
    config.refresh_interval_secs = config
        .refresh_interval_secs
        .or(defaults.refresh_interval_secs);
    config.max_input_bytes = config.max_input_bytes.or(defaults.max_input_bytes);
    config.dedup_registrations = config.dedup_registrations.or(defaults.dedup_registrations);
    config.proc_root = config.proc_root.take().or(defaults.proc_root);
    config.enable_health = config.enable_health.or(defaults.enable_health);
    config.enable_telemetry = config.enable_telemetry.or(defaults.enable_telemetry);
    config.log_level = config.log_level.take().or(defaults.log_level);
}

/// Shows configuration in requested format
fn show_config(config: &Config, format: ConfigFormat) -> Result<()> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    println!("{output}");
    Ok(())
}

/// Log level from the resolved config, which already holds any --log-level
/// override. Info when neither the file nor the CLI set one.
fn effective_log_level(config: &Config) -> Result<LogLevel> {
    match config.log_level.as_deref() {
        None => Ok(LogLevel::Info),
        Some(name) => <LogLevel as ValueEnum>::from_str(name, true)
            .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", name, e)),
    }
}

/// Initializes tracing logging subsystem with configured log level
fn setup_logging(level: &LogLevel) -> Result<()> {
    let log_level = match level {
        LogLevel::Off => return Ok(()),
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Logging initialized with level: {:?}", level);
    Ok(())
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    if let Some(command) = &args.command {
        let config = resolve_config(&args)?;
        if let Err(e) = validate_effective_config(&config) {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }

        return match command {
            Commands::Check { proc, all } => commands::command_check(*proc, *all, &config),
            Commands::Config {
                output,
                format,
                commented,
            } => commands::command_config(output.clone(), format.clone(), *commented),
            Commands::Sample {
                pid,
                iterations,
                interval_ms,
            } => commands::command_sample(*pid, *iterations, *interval_ms, &config),
        };
    }

    let config = resolve_config(&args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&effective_log_level(&config)?)?;
    info!("Starting herakles-proc-cpu-tracker");

    let health_stats = Arc::new(HealthStats::new());
    let oracle = Arc::new(ProcStatOracle::new(config.proc_root()));
    debug!("Sampling CPU time from {}", oracle.proc_root().display());

    let tracker = Tracker::start(
        TrackerOptions::from(&config),
        oracle,
        Arc::clone(&health_stats),
    );

    let state = Arc::new(AppState::new(
        Arc::clone(tracker.registry()),
        config.clone(),
        health_stats,
    )?);
    let app = handlers::router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_addr(), config.port()).parse()?;
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracker.stop().await;
            return Err(e).with_context(|| format!("Failed to bind {}", addr));
        }
    };
    info!("herakles-proc-cpu-tracker listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // The server is gone; no more registrations or reads can arrive.
    let report = tracker.stop().await;
    debug!("Shutdown report: {:?}", report);

    served.context("Server error")?;
    info!("herakles-proc-cpu-tracker stopped gracefully");
    Ok(())
}
