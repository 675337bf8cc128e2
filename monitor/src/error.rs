//! Error types for the stream monitor

use thiserror::Error;

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors raised by the ambient surface of the monitor.
///
/// Recording and classification never fail; collaborator failures are fed in
/// through the `success = false` path of the recording calls instead.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Invalid activity kind: {0}")]
    InvalidActivityKind(String),

    #[error("Invalid health status: {0}")]
    InvalidHealthStatus(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics exporter error: {0}")]
    Exporter(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Monitoring error: {component} - {message}")]
    Monitoring { component: String, message: String },
}

impl MonitorError {
    /// Create a new monitoring error
    pub fn monitoring<S: Into<String>>(component: S, message: S) -> Self {
        Self::Monitoring {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            MonitorError::InvalidActivityKind(_) => "validation",
            MonitorError::InvalidHealthStatus(_) => "validation",
            MonitorError::Config(_) => "config",
            MonitorError::Serialization(_) => "serialization",
            MonitorError::Io(_) => "io",
            MonitorError::Exporter(_) => "exporter",
            MonitorError::Monitoring { .. } => "monitoring",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let err = MonitorError::InvalidActivityKind("swap".to_string());
        assert_eq!(err.category(), "validation");
        assert_eq!(err.to_string(), "Invalid activity kind: swap");

        let err = MonitorError::monitoring("scheduler", "already stopped");
        assert_eq!(err.category(), "monitoring");
        assert_eq!(err.to_string(), "Monitoring error: scheduler - already stopped");
    }
}
