//! Report formatting and periodic emission

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::monitoring::health::{HealthClassifier, HealthReport, HealthStatus};
use crate::monitoring::metrics::{MetricsAggregator, MetricsSnapshot, TokenMetrics};
use crate::{MonitorError, Result};

/// Column order of [`csv_line`]
pub const CSV_HEADER: &str = "timestamp,messages_per_second,total_messages,avg_processing_time_ms,database_latency_ms,memory_mb,alerts_sent,stream_errors";

/// A snapshot, its classification, and the rendered text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub snapshot: MetricsSnapshot,
    pub health: HealthReport,
    pub text: String,
}

impl MonitoringReport {
    /// Build a report from a snapshot and its classification
    pub fn new(snapshot: MetricsSnapshot, health: HealthReport) -> Self {
        let text = format_report(&snapshot, &health);
        Self {
            snapshot,
            health,
            text,
        }
    }

    /// CSV row for the snapshot this report was built from
    pub fn csv_line(&self) -> String {
        csv_line(&self.snapshot)
    }
}

/// Per-token detail view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDetails {
    pub symbol: String,
    pub account_updates: u64,
    pub transactions: u64,
    pub average_transaction_size: f64,
    pub largest_transaction: f64,
    pub last_activity: Option<DateTime<Utc>>,

    /// Transactions per minute since last activity
    pub activity_rate_per_minute: f64,
}

impl TokenDetails {
    /// Derive the detail view of `token` as of `now`
    pub fn from_metrics(token: &TokenMetrics, now: DateTime<Utc>) -> Self {
        let minutes = token
            .last_activity
            .map(|at| (now - at).num_milliseconds().max(0) as f64 / 60_000.0)
            .unwrap_or(0.0);

        let activity_rate_per_minute = if minutes > 0.0 {
            token.transactions as f64 / minutes
        } else {
            0.0
        };

        Self {
            symbol: token.symbol.clone(),
            account_updates: token.account_updates,
            transactions: token.transactions,
            average_transaction_size: token.average_transaction_size,
            largest_transaction: token.largest_transaction,
            last_activity: token.last_activity,
            activity_rate_per_minute,
        }
    }
}

/// Render `seconds` as `1h 2m 3s`
pub fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Render the multi-line text report
pub fn format_report(snapshot: &MetricsSnapshot, health: &HealthReport) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "=== Stream Monitor Report ({}) ===",
        snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Status: {} | uptime {}",
        health.status.as_str().to_uppercase(),
        format_uptime(snapshot.uptime_seconds)
    );
    let _ = writeln!(
        out,
        "Messages: {} total, {:.2} msg/s, avg processing {:.2}ms, last {:.0}s ago",
        snapshot.total_messages,
        snapshot.messages_per_second,
        snapshot.average_processing_time_ms,
        snapshot.seconds_since_last_message()
    );
    let _ = writeln!(
        out,
        "Database [{}]: {} ok / {} failed, avg latency {:.2}ms",
        health.services.database,
        snapshot.database_operations,
        snapshot.failed_database_operations,
        snapshot.database_latency_ms
    );
    let _ = writeln!(
        out,
        "Stream [{}]: {} errors, {} reconnections",
        health.services.stream, snapshot.stream_errors, snapshot.reconnections
    );
    let _ = writeln!(
        out,
        "Alerts [{}]: {} sent / {} failed",
        health.services.alert_system, snapshot.alerts_sent, snapshot.alerts_failed
    );
    let _ = writeln!(
        out,
        "System [{}]: {:.1}MB resident, CPU {:.1}%",
        health.services.memory,
        snapshot.memory.resident_mb(),
        snapshot.cpu_usage_percent
    );

    if !snapshot.tokens.is_empty() {
        let _ = writeln!(out, "Tokens:");
        for token in snapshot.tokens.values() {
            let _ = writeln!(
                out,
                "  {:<8} accounts {:>8}  txs {:>8}  avg {:>12.2}  max {:>12.2}",
                token.symbol,
                token.account_updates,
                token.transactions,
                token.average_transaction_size,
                token.largest_transaction
            );
        }
    }

    if !health.issues.is_empty() {
        let _ = writeln!(out, "Issues:");
        for issue in &health.issues {
            let _ = writeln!(out, "  - {}", issue);
        }
    }

    if !health.advisories.is_empty() {
        let _ = writeln!(out, "Notes:");
        for note in &health.advisories {
            let _ = writeln!(out, "  - {}", note);
        }
    }

    out
}

/// Render one CSV row in [`CSV_HEADER`] order
pub fn csv_line(snapshot: &MetricsSnapshot) -> String {
    format!(
        "{},{:.2},{},{:.2},{:.2},{:.2},{},{}",
        snapshot.taken_at.to_rfc3339(),
        snapshot.messages_per_second,
        snapshot.total_messages,
        snapshot.average_processing_time_ms,
        snapshot.database_latency_ms,
        snapshot.memory.resident_mb(),
        snapshot.alerts_sent,
        snapshot.stream_errors
    )
}

/// Destination for periodic reports
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &MonitoringReport);
}

/// Sink that logs reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn emit(&self, report: &MonitoringReport) {
        let status = report.health.status;
        match status {
            HealthStatus::Healthy => info!(status = %status, "\n{}", report.text),
            HealthStatus::Warning => warn!(status = %status, "\n{}", report.text),
            HealthStatus::Critical => error!(status = %status, "\n{}", report.text),
        }
    }
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Emits a report on a fixed period until stopped
pub struct ReportScheduler {
    aggregator: Arc<MetricsAggregator>,
    classifier: HealthClassifier,
    sink: Arc<dyn ReportSink>,
    task: Mutex<Option<RunningTask>>,
}

impl ReportScheduler {
    /// Create a scheduler reading from `aggregator`
    pub fn new(
        aggregator: Arc<MetricsAggregator>,
        classifier: HealthClassifier,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            aggregator,
            classifier,
            sink,
            task: Mutex::new(None),
        }
    }

    /// Snapshot, classify, and render without emitting
    pub fn build_report(&self) -> MonitoringReport {
        build_report(&self.aggregator, &self.classifier)
    }

    /// Start periodic emission. The first report is emitted immediately.
    ///
    /// Starting an already running scheduler is a no-op. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(MonitorError::monitoring("reporter", "report interval must be non-zero"));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MonitorError::monitoring("reporter".to_string(), e.to_string()))?;

        let mut task = self.task.lock();
        if task.is_some() {
            return Ok(());
        }

        info!("Starting periodic reports with interval: {:?}", period);

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let aggregator = Arc::clone(&self.aggregator);
        let classifier = self.classifier.clone();
        let sink = Arc::clone(&self.sink);

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let report = build_report(&aggregator, &classifier);
                        sink.emit(&report);
                    }
                }
            }
        });

        *task = Some(RunningTask { cancel, handle });
        Ok(())
    }

    /// Stop periodic emission. Recorded state is untouched.
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            info!("Stopping periodic reports");
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!("Report task ended abnormally: {}", e);
            }
        }
    }

    /// Check whether periodic emission is active
    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }
}

fn build_report(aggregator: &MetricsAggregator, classifier: &HealthClassifier) -> MonitoringReport {
    let snapshot = aggregator.snapshot();
    let health = classifier.classify(&snapshot);
    MonitoringReport::new(snapshot, health)
}
