//! Telemetry monitor
//!
//! Bundles the timer registry, aggregator, classifier, and report scheduler
//! into one explicitly constructed instance. Share it as
//! `Arc<TelemetryMonitor>` with every component that records events; the
//! process wiring owns `start`/`stop`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::MonitorConfig;
use crate::monitoring::health::{HealthClassifier, HealthReport, HealthThresholds};
use crate::monitoring::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::monitoring::report::{
    csv_line, MonitoringReport, ReportScheduler, ReportSink, TokenDetails, TracingSink,
};
use crate::monitoring::system::{ResourceProbe, SysinfoProbe};
use crate::monitoring::timer::TimerRegistry;
use crate::{ActivityKind, Result};

/// Snapshot and health together, for dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorOverview {
    pub name: String,
    pub version: String,
    pub metrics: MetricsSnapshot,
    pub health: HealthReport,
}

/// Process-wide telemetry and health monitor
pub struct TelemetryMonitor {
    timers: TimerRegistry,
    aggregator: Arc<MetricsAggregator>,
    classifier: HealthClassifier,
    scheduler: ReportScheduler,
    report_interval: Duration,
}

impl TelemetryMonitor {
    /// Create a monitor from configuration, logging reports through `tracing`
    pub fn new(config: &MonitorConfig) -> Self {
        Self::builder(config).build()
    }

    /// Start building a monitor with custom collaborators
    pub fn builder(config: &MonitorConfig) -> TelemetryMonitorBuilder {
        TelemetryMonitorBuilder {
            tokens: config.tokens.clone(),
            thresholds: config.thresholds.clone(),
            report_interval: config.reporting.interval(),
            probe: None,
            sink: None,
        }
    }

    /// Start periodic reporting
    pub fn start(&self) -> Result<()> {
        info!(
            tokens = ?self.aggregator.tracked_tokens(),
            "Starting telemetry monitor"
        );
        self.scheduler.start(self.report_interval)
    }

    /// Stop periodic reporting. Recorded state is kept.
    pub async fn stop(&self) {
        self.scheduler.stop().await;
        info!("Telemetry monitor stopped");
    }

    /// Check whether periodic reporting is active
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn start_timer(&self, id: impl Into<String>, label: impl Into<String>) {
        self.timers.start_timer(id, label);
    }

    /// Start a timer under a generated id and return the id
    pub fn begin_timer(&self, label: impl Into<String>) -> String {
        self.timers.begin(label)
    }

    /// Stop a timer and return elapsed milliseconds (`0.0` if unknown)
    pub fn stop_timer(&self, id: &str) -> f64 {
        self.timers.stop_timer(id)
    }

    /// Stop a message-processing timer, then record the message and its duration.
    ///
    /// The message is counted even when `timer_id` is unknown, but no duration
    /// is folded into the processing-time average and `0.0` is returned.
    pub fn complete_message(&self, timer_id: &str) -> f64 {
        let elapsed_ms = self.timers.try_stop(timer_id);
        if let Some(elapsed_ms) = elapsed_ms {
            self.aggregator.record_processing_time(elapsed_ms);
        }
        self.aggregator.record_message_processed();
        elapsed_ms.unwrap_or(0.0)
    }

    pub fn record_message_processed(&self) {
        self.aggregator.record_message_processed();
    }

    pub fn record_processing_time(&self, duration_ms: f64) {
        self.aggregator.record_processing_time(duration_ms);
    }

    pub fn record_database_operation(&self, latency_ms: f64, success: bool) {
        self.aggregator.record_database_operation(latency_ms, success);
    }

    pub fn record_token_activity(&self, symbol: &str, kind: ActivityKind, amount: Option<f64>) {
        self.aggregator.record_token_activity(symbol, kind, amount);
    }

    pub fn record_stream_error(&self) {
        self.aggregator.record_stream_error();
    }

    pub fn record_reconnection(&self) {
        self.aggregator.record_reconnection();
    }

    pub fn record_alert_sent(&self, success: bool) {
        self.aggregator.record_alert_sent(success);
    }

    /// Independent copy of all aggregate state
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.aggregator.snapshot()
    }

    /// Classify a fresh snapshot
    pub fn health_status(&self) -> HealthReport {
        self.classifier.classify(&self.aggregator.snapshot())
    }

    /// Snapshot, classify, and render a report on demand
    pub fn report(&self) -> MonitoringReport {
        self.scheduler.build_report()
    }

    /// Formatted text report
    pub fn report_text(&self) -> String {
        self.report().text
    }

    /// Single CSV row of headline figures
    pub fn csv_line(&self) -> String {
        csv_line(&self.aggregator.snapshot())
    }

    /// Detail view for one tracked token
    pub fn token_details(&self, symbol: &str) -> Option<TokenDetails> {
        let snapshot = self.aggregator.snapshot();
        snapshot
            .tokens
            .get(symbol)
            .map(|token| TokenDetails::from_metrics(token, snapshot.taken_at))
    }

    /// Snapshot and health in one structure
    pub fn overview(&self) -> MonitorOverview {
        let metrics = self.aggregator.snapshot();
        let health = self.classifier.classify(&metrics);

        MonitorOverview {
            name: crate::SYSTEM_NAME.to_string(),
            version: crate::VERSION.to_string(),
            metrics,
            health,
        }
    }

    /// Overview serialized as pretty JSON
    pub fn overview_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.overview())?)
    }

    /// Thresholds used for classification
    pub fn thresholds(&self) -> &HealthThresholds {
        self.classifier.thresholds()
    }

    /// Number of timers started but not yet stopped
    pub fn active_timers(&self) -> usize {
        self.timers.active_count()
    }
}

/// Builder for [`TelemetryMonitor`]
pub struct TelemetryMonitorBuilder {
    tokens: Vec<String>,
    thresholds: HealthThresholds,
    report_interval: Duration,
    probe: Option<Box<dyn ResourceProbe>>,
    sink: Option<Arc<dyn ReportSink>>,
}

impl TelemetryMonitorBuilder {
    /// Use a custom resource probe
    pub fn probe(mut self, probe: Box<dyn ResourceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Send periodic reports to `sink`
    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override the report interval
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn build(self) -> TelemetryMonitor {
        let probe = self
            .probe
            .unwrap_or_else(|| Box::new(SysinfoProbe::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));

        let aggregator = Arc::new(MetricsAggregator::with_probe(self.tokens, probe));
        let classifier = HealthClassifier::new(self.thresholds);
        let scheduler = ReportScheduler::new(Arc::clone(&aggregator), classifier.clone(), sink);

        TelemetryMonitor {
            timers: TimerRegistry::new(),
            aggregator,
            classifier,
            scheduler,
            report_interval: self.report_interval,
        }
    }
}
