//! Health classification
//!
//! Derives tri-state verdicts per subsystem, and overall, purely from a
//! [`MetricsSnapshot`] and a fixed threshold table.

use serde::{Deserialize, Serialize};

use crate::monitoring::metrics::MetricsSnapshot;
use crate::{MonitorError, Result};

/// Stream error count above which the stream is reported as degraded
pub const STREAM_ERROR_WARNING_LIMIT: u64 = 10;

/// Alert failure rate above which the alert system is critical
pub const ALERT_FAILURE_CRITICAL_RATE: f64 = 0.5;

/// Alert failure rate above which the alert system is degraded
pub const ALERT_FAILURE_WARNING_RATE: f64 = 0.1;

/// Health verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Operating within thresholds
    Healthy,

    /// Degraded but still processing
    Warning,

    /// Requires immediate attention
    Critical,
}

impl HealthStatus {
    /// Check if the status is operational (Healthy or Warning)
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Warning)
    }

    /// Check if the status requires immediate attention
    pub fn requires_attention(&self) -> bool {
        matches!(self, HealthStatus::Critical)
    }

    /// Get the status as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "healthy" => Ok(HealthStatus::Healthy),
            "warning" => Ok(HealthStatus::Warning),
            "critical" => Ok(HealthStatus::Critical),
            _ => Err(MonitorError::InvalidHealthStatus(s.to_string())),
        }
    }
}

/// Threshold table used by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    /// Average processing time considered slow, in milliseconds
    pub max_processing_time_ms: f64,

    /// Average database latency considered slow, in milliseconds
    pub max_database_latency_ms: f64,

    /// Resident memory considered high, in bytes
    pub max_memory_bytes: u64,

    /// Expected minimum throughput
    pub min_messages_per_minute: f64,

    /// Longest tolerated gap between messages, in seconds
    pub max_silence_seconds: u64,

    /// Database failure rate (0.0 to 1.0) considered critical
    pub max_error_rate: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_processing_time_ms: 1_000.0,
            max_database_latency_ms: 500.0,
            max_memory_bytes: 512 * 1024 * 1024,
            min_messages_per_minute: 1.0,
            max_silence_seconds: 300,
            max_error_rate: 0.05,
        }
    }
}

/// Verdict per watched subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub database: HealthStatus,
    pub stream: HealthStatus,
    pub alert_system: HealthStatus,
    pub memory: HealthStatus,
}

impl ServiceHealth {
    /// Worst verdict across all subsystems
    pub fn worst(&self) -> HealthStatus {
        [self.database, self.stream, self.memory, self.alert_system]
            .into_iter()
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }
}

/// Health report for the monitored system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall verdict
    pub status: HealthStatus,

    /// Per-subsystem verdicts
    pub services: ServiceHealth,

    /// One message per non-healthy subsystem, in evaluation order
    pub issues: Vec<String>,

    /// Observations that do not affect any verdict
    pub advisories: Vec<String>,

    /// System uptime in seconds
    pub uptime_seconds: u64,

    /// Capture time of the snapshot this report was derived from
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    /// Check if the overall status is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy)
    }
}

/// Classifier bound to a threshold table
#[derive(Debug, Clone, Default)]
pub struct HealthClassifier {
    thresholds: HealthThresholds,
}

impl HealthClassifier {
    /// Create a classifier using `thresholds`
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use
    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    /// Classify a snapshot
    pub fn classify(&self, snapshot: &MetricsSnapshot) -> HealthReport {
        classify(snapshot, &self.thresholds)
    }
}

/// Classify `snapshot` against `thresholds`.
///
/// Deterministic: identical inputs produce identical reports, including issue
/// order (database, stream, memory, alert system).
pub fn classify(snapshot: &MetricsSnapshot, thresholds: &HealthThresholds) -> HealthReport {
    let mut issues = Vec::new();

    let database = check_database(snapshot, thresholds, &mut issues);
    let stream = check_stream(snapshot, thresholds, &mut issues);
    let memory = check_memory(snapshot, thresholds, &mut issues);
    let alert_system = check_alert_system(snapshot, &mut issues);

    let services = ServiceHealth {
        database,
        stream,
        alert_system,
        memory,
    };

    HealthReport {
        status: services.worst(),
        services,
        issues,
        advisories: advisories(snapshot, thresholds),
        uptime_seconds: snapshot.uptime_seconds,
        timestamp: snapshot.taken_at,
    }
}

fn check_database(
    snapshot: &MetricsSnapshot,
    thresholds: &HealthThresholds,
    issues: &mut Vec<String>,
) -> HealthStatus {
    if let Some(rate) = snapshot.database_failure_rate() {
        if rate > thresholds.max_error_rate {
            issues.push(format!(
                "Database failure rate {:.1}% exceeds {:.1}%",
                rate * 100.0,
                thresholds.max_error_rate * 100.0
            ));
            return HealthStatus::Critical;
        }
    }

    if snapshot.database_latency_ms > thresholds.max_database_latency_ms {
        issues.push(format!(
            "Database latency {:.0}ms exceeds {:.0}ms",
            snapshot.database_latency_ms, thresholds.max_database_latency_ms
        ));
        return HealthStatus::Warning;
    }

    HealthStatus::Healthy
}

fn check_stream(
    snapshot: &MetricsSnapshot,
    thresholds: &HealthThresholds,
    issues: &mut Vec<String>,
) -> HealthStatus {
    let silence = snapshot.seconds_since_last_message();
    if silence > thresholds.max_silence_seconds as f64 {
        issues.push(format!(
            "No messages received for {:.0}s (limit {}s)",
            silence, thresholds.max_silence_seconds
        ));
        return HealthStatus::Critical;
    }

    if snapshot.stream_errors > STREAM_ERROR_WARNING_LIMIT {
        issues.push(format!("{} stream errors recorded", snapshot.stream_errors));
        return HealthStatus::Warning;
    }

    HealthStatus::Healthy
}

// Memory pressure alone never escalates past a warning.
fn check_memory(
    snapshot: &MetricsSnapshot,
    thresholds: &HealthThresholds,
    issues: &mut Vec<String>,
) -> HealthStatus {
    if snapshot.memory.resident_bytes > thresholds.max_memory_bytes {
        issues.push(format!(
            "Memory usage {:.1}MB exceeds {:.1}MB",
            snapshot.memory.resident_mb(),
            thresholds.max_memory_bytes as f64 / (1024.0 * 1024.0)
        ));
        return HealthStatus::Warning;
    }

    HealthStatus::Healthy
}

fn check_alert_system(snapshot: &MetricsSnapshot, issues: &mut Vec<String>) -> HealthStatus {
    let Some(rate) = snapshot.alert_failure_rate() else {
        return HealthStatus::Healthy;
    };

    let status = if rate > ALERT_FAILURE_CRITICAL_RATE {
        HealthStatus::Critical
    } else if rate > ALERT_FAILURE_WARNING_RATE {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    };

    if status != HealthStatus::Healthy {
        issues.push(format!("Alert failure rate {:.1}%", rate * 100.0));
    }

    status
}

fn advisories(snapshot: &MetricsSnapshot, thresholds: &HealthThresholds) -> Vec<String> {
    let mut notes = Vec::new();

    if snapshot.average_processing_time_ms > thresholds.max_processing_time_ms {
        notes.push(format!(
            "Average processing time {:.0}ms exceeds {:.0}ms",
            snapshot.average_processing_time_ms, thresholds.max_processing_time_ms
        ));
    }

    // Throughput is meaningless until at least a minute has elapsed.
    let per_minute = snapshot.messages_per_second * 60.0;
    if snapshot.uptime_seconds >= 60 && per_minute < thresholds.min_messages_per_minute {
        notes.push(format!(
            "Throughput {:.2} msg/min below expected {:.2} msg/min",
            per_minute, thresholds.min_messages_per_minute
        ));
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::metrics::MetricsAggregator;
    use crate::monitoring::system::{FixedProbe, MemoryUsage, ResourceSample};

    fn snapshot() -> MetricsSnapshot {
        MetricsAggregator::with_probe(["SOL"], Box::new(FixedProbe(ResourceSample::default())))
            .snapshot()
    }

    #[test]
    fn test_health_status_operational() {
        assert!(HealthStatus::Healthy.is_operational());
        assert!(HealthStatus::Warning.is_operational());
        assert!(!HealthStatus::Critical.is_operational());
        assert!(HealthStatus::Critical.requires_attention());
        assert!(HealthStatus::Critical > HealthStatus::Warning);
        assert_eq!("WARNING".parse::<HealthStatus>().unwrap(), HealthStatus::Warning);
        assert!("degraded".parse::<HealthStatus>().is_err());
    }

    #[test]
    fn test_fresh_snapshot_is_healthy() {
        let report = classify(&snapshot(), &HealthThresholds::default());
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.is_healthy());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_database_failure_rate_beats_latency() {
        let mut snap = snapshot();
        snap.database_operations = 10;
        snap.failed_database_operations = 5;
        snap.database_latency_ms = 900.0;

        let report = classify(&snap, &HealthThresholds::default());
        assert_eq!(report.services.database, HealthStatus::Critical);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].contains("33.3%"));
    }

    #[test]
    fn test_database_latency_warning() {
        let mut snap = snapshot();
        snap.database_operations = 4;
        snap.database_latency_ms = 750.0;

        let report = classify(&snap, &HealthThresholds::default());
        assert_eq!(report.services.database, HealthStatus::Warning);
        assert_eq!(report.status, HealthStatus::Warning);
    }

    #[test]
    fn test_stream_errors_warning() {
        let mut snap = snapshot();
        snap.stream_errors = STREAM_ERROR_WARNING_LIMIT;
        assert_eq!(
            classify(&snap, &HealthThresholds::default()).services.stream,
            HealthStatus::Healthy
        );

        snap.stream_errors = STREAM_ERROR_WARNING_LIMIT + 1;
        assert_eq!(
            classify(&snap, &HealthThresholds::default()).services.stream,
            HealthStatus::Warning
        );
    }

    #[test]
    fn test_memory_never_critical() {
        let mut snap = snapshot();
        snap.memory = MemoryUsage {
            resident_bytes: u64::MAX,
            virtual_bytes: u64::MAX,
        };

        let report = classify(&snap, &HealthThresholds::default());
        assert_eq!(report.services.memory, HealthStatus::Warning);
        assert_eq!(report.status, HealthStatus::Warning);
    }

    #[test]
    fn test_alert_system_tiers() {
        let thresholds = HealthThresholds::default();
        let mut snap = snapshot();

        snap.alerts_sent = 19;
        snap.alerts_failed = 1;
        assert_eq!(classify(&snap, &thresholds).services.alert_system, HealthStatus::Healthy);

        snap.alerts_sent = 8;
        snap.alerts_failed = 2;
        assert_eq!(classify(&snap, &thresholds).services.alert_system, HealthStatus::Warning);

        snap.alerts_sent = 4;
        snap.alerts_failed = 6;
        assert_eq!(classify(&snap, &thresholds).services.alert_system, HealthStatus::Critical);
    }

    #[test]
    fn test_issue_order_is_fixed() {
        let mut snap = snapshot();
        snap.alerts_failed = 3;
        snap.memory.resident_bytes = u64::MAX;
        snap.stream_errors = 50;
        snap.failed_database_operations = 1;

        let report = classify(&snap, &HealthThresholds::default());
        assert_eq!(report.status, HealthStatus::Critical);
        assert_eq!(report.issues.len(), 4);
        assert!(report.issues[0].starts_with("Database"));
        assert!(report.issues[1].contains("stream errors"));
        assert!(report.issues[2].starts_with("Memory"));
        assert!(report.issues[3].starts_with("Alert"));
    }

    #[test]
    fn test_advisories_do_not_change_verdict() {
        let mut snap = snapshot();
        snap.average_processing_time_ms = 5_000.0;

        let report = classify(&snap, &HealthThresholds::default());
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.advisories.len(), 1);
    }
}
