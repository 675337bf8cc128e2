//! Solstream Monitor - Main entry point
//!
//! Hosts the telemetry monitor with periodic reporting until shutdown.

use clap::{Arg, ArgAction, Command};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solstream_monitor::{
    config::{LoggingConfig, MonitorConfig},
    monitoring::CSV_HEADER,
    MonitorError, Result, TelemetryMonitor, VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = run().await {
        error!(category = e.category(), error = %e, "Solstream Monitor stopped with error");
        return Err(e);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let matches = Command::new("solstream-monitor")
        .version(VERSION)
        .about("Telemetry and health monitor for blockchain event streams")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (without extension)")
                .default_value("config/solstream-monitor"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("tokens")
                .short('t')
                .long("tokens")
                .value_name("SYMBOLS")
                .help("Comma-separated token symbols to track"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64))
                .help("Report interval in seconds"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Print one report and CSV line, then exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config/solstream-monitor");
    let mut config = MonitorConfig::load_from(config_path)?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    if let Some(tokens) = matches.get_one::<String>("tokens") {
        config.tokens = parse_tokens(tokens);
    }
    if let Some(interval) = matches.get_one::<u64>("interval") {
        config.reporting.interval_seconds = *interval;
    }
    config.validate()?;

    init_logging(&config.logging)?;
    info!(version = VERSION, config_path, "Starting Solstream Monitor");

    if config.prometheus.enabled {
        install_prometheus(&config.prometheus.listen_address)?;
    }

    let monitor = Arc::new(TelemetryMonitor::new(&config));

    if matches.get_flag("once") {
        let report = monitor.report();
        print!("{}", report.text);
        println!("{}", CSV_HEADER);
        println!("{}", report.csv_line());
        if !report.health.is_healthy() {
            warn!(status = %report.health.status, issues = ?report.health.issues, "Monitor is not healthy");
        }
        return Ok(());
    }

    if config.reporting.enabled {
        monitor.start()?;
    } else {
        warn!("Periodic reporting disabled");
    }

    shutdown_signal().await?;
    info!("Shutdown signal received, stopping monitor...");

    monitor.stop().await;
    info!(final_report = %monitor.csv_line(), "Solstream Monitor stopped");

    Ok(())
}

/// Initialize logging, letting `RUST_LOG` override the configured level
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let level = match logging.level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        other => {
            eprintln!("Invalid log level: {}. Using 'info'", other);
            tracing::Level::INFO
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("solstream_monitor={}", level).into());

    if logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}

/// Install the Prometheus recorder and scrape endpoint
fn install_prometheus(listen_address: &str) -> Result<()> {
    let addr: SocketAddr = listen_address.parse().map_err(|e: std::net::AddrParseError| {
        MonitorError::monitoring("prometheus".to_string(), e.to_string())
    })?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Parse comma-separated token symbols
fn parse_tokens(tokens: &str) -> Vec<String> {
    tokens
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c().await?;

    Ok(())
}
