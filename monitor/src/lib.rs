//! # Solstream Monitor
//!
//! Telemetry and health monitoring for a high-rate blockchain event stream.
//! Event-processing code records timings and outcomes into a shared
//! [`TelemetryMonitor`]; dashboards and the periodic reporter read immutable
//! snapshots and tri-state health verdicts back out.

pub mod config;
pub mod error;
pub mod monitoring;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use monitoring::TelemetryMonitor;

/// Current version of the monitor
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Monitor identifier
pub const SYSTEM_NAME: &str = "solstream-monitor";

/// Kind of per-token activity observed on the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Account state update touching a token account
    Account,

    /// Transaction moving the token
    Transaction,
}

impl ActivityKind {
    /// Get the kind name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ActivityKind::Account => "account",
            ActivityKind::Transaction => "transaction",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ActivityKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "account" => Ok(ActivityKind::Account),
            "transaction" | "tx" => Ok(ActivityKind::Transaction),
            _ => Err(MonitorError::InvalidActivityKind(s.to_string())),
        }
    }
}
