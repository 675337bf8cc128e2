//! Stream telemetry and health monitoring
//!
//! Timers, running aggregates, threshold-based health classification, and
//! periodic reporting for the event-processing path.

pub mod health;
pub mod metrics;
pub mod report;
pub mod service;
pub mod system;
pub mod timer;

pub use health::{
    classify, HealthClassifier, HealthReport, HealthStatus, HealthThresholds, ServiceHealth,
};
pub use metrics::{MetricsAggregator, MetricsSnapshot, TokenMetrics};
pub use report::{MonitoringReport, ReportScheduler, ReportSink, TokenDetails, TracingSink, CSV_HEADER};
pub use service::{MonitorOverview, TelemetryMonitor, TelemetryMonitorBuilder};
pub use system::{FixedProbe, MemoryUsage, ResourceProbe, ResourceSample, SysinfoProbe};
pub use timer::TimerRegistry;
