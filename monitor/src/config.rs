//! Configuration management for the stream monitor
//!
//! Read once at startup and treated as immutable for the process lifetime.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::monitoring::health::HealthThresholds;

/// Main configuration structure for the monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Token symbols tracked by the aggregator
    pub tokens: Vec<String>,

    /// Health classification thresholds
    pub thresholds: HealthThresholds,

    /// Periodic report settings
    pub reporting: ReportingConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Prometheus exporter settings
    pub prometheus: PrometheusConfig,
}

/// Periodic report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Emit periodic reports
    pub enabled: bool,

    /// Report interval in seconds
    pub interval_seconds: u64,
}

impl ReportingConfig {
    /// Report interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Emit JSON formatted log lines
    pub json: bool,
}

/// Prometheus exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and scrape endpoint
    pub enabled: bool,

    /// Scrape endpoint bind address
    pub listen_address: String,
}

impl MonitorConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config/solstream-monitor")
    }

    /// Load configuration using `base` as the file stem
    pub fn load_from(base: &str) -> std::result::Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name(base).required(false))
            .add_source(File::with_name(&format!("{}-{}", base, run_mode)).required(false))
            .add_source(
                Environment::with_prefix("SOLSTREAM")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("tokens"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.tokens.is_empty() {
            return Err(ConfigError::Message(
                "At least one token symbol must be tracked".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for token in &self.tokens {
            if token.trim().is_empty() {
                return Err(ConfigError::Message("Token symbols must not be blank".to_string()));
            }
            if !seen.insert(token.as_str()) {
                return Err(ConfigError::Message(format!("Duplicate token symbol: {}", token)));
            }
        }

        if self.reporting.interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Report interval must be greater than zero".to_string(),
            ));
        }

        let rate = self.thresholds.max_error_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::Message(format!(
                "Max error rate must be between 0 and 1, got {}",
                rate
            )));
        }

        if self.thresholds.max_database_latency_ms <= 0.0
            || self.thresholds.max_processing_time_ms <= 0.0
        {
            return Err(ConfigError::Message(
                "Latency thresholds must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tokens: vec!["SOL".to_string(), "USDC".to_string(), "USDT".to_string()],
            thresholds: HealthThresholds::default(),
            reporting: ReportingConfig::default(),
            logging: LoggingConfig::default(),
            prometheus: PrometheusConfig::default(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: "0.0.0.0:9090".to_string(),
        }
    }
}
