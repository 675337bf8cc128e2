//! Metrics aggregation
//!
//! Single source of truth for every counter and running average. All state
//! lives behind one mutex; each recording call holds it for a constant amount
//! of work, and readers only ever receive cloned snapshots.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

use crate::monitoring::system::{MemoryUsage, ResourceProbe, SysinfoProbe};
use crate::ActivityKind;

/// Fold `value` into a mean currently built from `count` samples.
pub fn running_average(average: f64, count: u64, value: f64) -> f64 {
    let count = count as f64;
    (average * count + value) / (count + 1.0)
}

/// Per-token rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetrics {
    /// Token symbol
    pub symbol: String,

    /// Account updates seen for this token
    pub account_updates: u64,

    /// Transactions seen for this token
    pub transactions: u64,

    /// Mean transaction amount over transactions that carried one
    pub average_transaction_size: f64,

    /// Largest transaction amount observed
    pub largest_transaction: f64,

    /// Number of transactions folded into the average size
    pub sized_transactions: u64,

    /// Last time any activity was recorded
    pub last_activity: Option<DateTime<Utc>>,
}

impl TokenMetrics {
    /// Create an empty rollup for `symbol`
    pub fn new(symbol: String) -> Self {
        Self {
            symbol,
            account_updates: 0,
            transactions: 0,
            average_transaction_size: 0.0,
            largest_transaction: 0.0,
            sized_transactions: 0,
            last_activity: None,
        }
    }

    fn record(&mut self, kind: ActivityKind, amount: Option<f64>, now: DateTime<Utc>) {
        match kind {
            ActivityKind::Account => self.account_updates += 1,
            ActivityKind::Transaction => {
                self.transactions += 1;
                if let Some(amount) = amount {
                    self.average_transaction_size = running_average(
                        self.average_transaction_size,
                        self.sized_transactions,
                        amount,
                    );
                    self.sized_transactions += 1;
                    if self.sized_transactions == 1 || amount > self.largest_transaction {
                        self.largest_transaction = amount;
                    }
                }
            }
        }
        self.last_activity = Some(now);
    }
}

/// Immutable point-in-time copy of all aggregate state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Lifetime average throughput
    pub messages_per_second: f64,

    /// Total messages processed
    pub total_messages: u64,

    /// Average processing time in milliseconds
    pub average_processing_time_ms: f64,

    /// Average latency of successful database operations in milliseconds
    pub database_latency_ms: f64,

    /// Successful database operations
    pub database_operations: u64,

    /// Failed database operations
    pub failed_database_operations: u64,

    /// Process memory figures
    pub memory: MemoryUsage,

    /// Process CPU usage as a percentage of host capacity
    pub cpu_usage_percent: f64,

    /// Seconds since the aggregator was created
    pub uptime_seconds: u64,

    /// When the last message was processed (creation time if none yet)
    pub last_message_at: DateTime<Utc>,

    /// Stream errors reported by the subscription collaborator
    pub stream_errors: u64,

    /// Stream reconnections
    pub reconnections: u64,

    /// Alerts delivered
    pub alerts_sent: u64,

    /// Alerts that failed to deliver
    pub alerts_failed: u64,

    /// Per-token rollups, keyed by symbol
    pub tokens: BTreeMap<String, TokenMetrics>,

    /// When this snapshot was captured
    pub taken_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Seconds since the last processed message, as of capture time
    pub fn seconds_since_last_message(&self) -> f64 {
        let elapsed = self.taken_at - self.last_message_at;
        (elapsed.num_milliseconds().max(0) as f64) / 1000.0
    }

    /// Database failure rate, or `None` before any operation completed
    pub fn database_failure_rate(&self) -> Option<f64> {
        failure_rate(self.database_operations, self.failed_database_operations)
    }

    /// Alert failure rate, or `None` before any alert was attempted
    pub fn alert_failure_rate(&self) -> Option<f64> {
        failure_rate(self.alerts_sent, self.alerts_failed)
    }
}

fn failure_rate(succeeded: u64, failed: u64) -> Option<f64> {
    let total = succeeded + failed;
    if total == 0 {
        None
    } else {
        Some(failed as f64 / total as f64)
    }
}

#[derive(Debug)]
struct AggregateState {
    total_messages: u64,
    messages_per_second: f64,
    processing_samples: u64,
    average_processing_time_ms: f64,
    database_operations: u64,
    failed_database_operations: u64,
    database_latency_ms: f64,
    memory: MemoryUsage,
    cpu_usage_percent: f64,
    uptime_seconds: u64,
    last_message_at: DateTime<Utc>,
    stream_errors: u64,
    reconnections: u64,
    alerts_sent: u64,
    alerts_failed: u64,
    tokens: BTreeMap<String, TokenMetrics>,
}

/// Aggregator owning all counters and running averages
pub struct MetricsAggregator {
    state: Mutex<AggregateState>,
    started_at: Instant,
    probe: Box<dyn ResourceProbe>,
}

impl MetricsAggregator {
    /// Create an aggregator pre-seeded with `tokens`, sampling the real process
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_probe(tokens, Box::new(SysinfoProbe::new()))
    }

    /// Create an aggregator with a custom resource probe
    pub fn with_probe<I, S>(tokens: I, probe: Box<dyn ResourceProbe>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokens
            .into_iter()
            .map(|symbol| {
                let symbol: String = symbol.into();
                (symbol.clone(), TokenMetrics::new(symbol))
            })
            .collect();

        Self {
            state: Mutex::new(AggregateState {
                total_messages: 0,
                messages_per_second: 0.0,
                processing_samples: 0,
                average_processing_time_ms: 0.0,
                database_operations: 0,
                failed_database_operations: 0,
                database_latency_ms: 0.0,
                memory: MemoryUsage::default(),
                cpu_usage_percent: 0.0,
                uptime_seconds: 0,
                last_message_at: Utc::now(),
                stream_errors: 0,
                reconnections: 0,
                alerts_sent: 0,
                alerts_failed: 0,
                tokens,
            }),
            started_at: Instant::now(),
            probe,
        }
    }

    /// Record one processed message
    pub fn record_message_processed(&self) {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        let rate = {
            let mut state = self.state.lock();
            state.total_messages += 1;
            state.last_message_at = Utc::now();
            state.messages_per_second = if elapsed > 0.0 {
                state.total_messages as f64 / elapsed
            } else {
                0.0
            };
            state.messages_per_second
        };

        metrics::counter!("solstream_messages_processed_total", 1);
        metrics::gauge!("solstream_messages_per_second", rate);
    }

    /// Fold a completed processing duration into the average processing time
    pub fn record_processing_time(&self, duration_ms: f64) {
        {
            let mut state = self.state.lock();
            state.average_processing_time_ms = running_average(
                state.average_processing_time_ms,
                state.processing_samples,
                duration_ms,
            );
            state.processing_samples += 1;
        }

        metrics::histogram!("solstream_processing_time_ms", duration_ms);
    }

    /// Record the outcome of a database operation.
    ///
    /// Failed operations only bump the failure counter; they never touch the
    /// latency average.
    pub fn record_database_operation(&self, latency_ms: f64, success: bool) {
        {
            let mut state = self.state.lock();
            if success {
                state.database_latency_ms = running_average(
                    state.database_latency_ms,
                    state.database_operations,
                    latency_ms,
                );
                state.database_operations += 1;
            } else {
                state.failed_database_operations += 1;
            }
        }

        if success {
            metrics::counter!("solstream_database_operations_total", 1, "outcome" => "success");
            metrics::histogram!("solstream_database_latency_ms", latency_ms);
        } else {
            metrics::counter!("solstream_database_operations_total", 1, "outcome" => "failure");
        }
    }

    /// Record activity for a tracked token. Unknown symbols are dropped.
    pub fn record_token_activity(&self, symbol: &str, kind: ActivityKind, amount: Option<f64>) {
        let accepted = {
            let mut state = self.state.lock();
            match state.tokens.get_mut(symbol) {
                Some(token) => {
                    token.record(kind, amount, Utc::now());
                    true
                }
                None => false,
            }
        };

        if !accepted {
            debug!(token = %symbol, kind = %kind, "Ignoring activity for untracked token");
            return;
        }

        metrics::counter!(
            "solstream_token_activity_total",
            1,
            "token" => symbol.to_string(),
            "kind" => kind.name()
        );
    }

    /// Record a stream error
    pub fn record_stream_error(&self) {
        self.state.lock().stream_errors += 1;
        metrics::counter!("solstream_stream_errors_total", 1);
    }

    /// Record a stream reconnection
    pub fn record_reconnection(&self) {
        self.state.lock().reconnections += 1;
        metrics::counter!("solstream_reconnections_total", 1);
    }

    /// Record an alert delivery attempt
    pub fn record_alert_sent(&self, success: bool) {
        {
            let mut state = self.state.lock();
            if success {
                state.alerts_sent += 1;
            } else {
                state.alerts_failed += 1;
            }
        }

        let outcome = if success { "success" } else { "failure" };
        metrics::counter!("solstream_alerts_total", 1, "outcome" => outcome);
    }

    /// Refresh memory and CPU figures and recompute uptime
    pub fn update_system_metrics(&self) {
        let sample = self.probe.sample();
        let uptime_seconds = self.started_at.elapsed().as_secs();

        {
            let mut state = self.state.lock();
            state.memory = sample.memory;
            state.cpu_usage_percent = sample.cpu_percent;
            state.uptime_seconds = uptime_seconds;
        }

        metrics::gauge!("solstream_memory_resident_bytes", sample.memory.resident_bytes as f64);
        metrics::gauge!("solstream_cpu_usage_percent", sample.cpu_percent);
    }

    /// Refresh system figures and return an independent copy of all state
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.update_system_metrics();

        let state = self.state.lock();
        MetricsSnapshot {
            messages_per_second: state.messages_per_second,
            total_messages: state.total_messages,
            average_processing_time_ms: state.average_processing_time_ms,
            database_latency_ms: state.database_latency_ms,
            database_operations: state.database_operations,
            failed_database_operations: state.failed_database_operations,
            memory: state.memory,
            cpu_usage_percent: state.cpu_usage_percent,
            uptime_seconds: state.uptime_seconds,
            last_message_at: state.last_message_at,
            stream_errors: state.stream_errors,
            reconnections: state.reconnections,
            alerts_sent: state.alerts_sent,
            alerts_failed: state.alerts_failed,
            tokens: state.tokens.clone(),
            taken_at: Utc::now(),
        }
    }

    /// Copy of a single token's rollup
    pub fn token(&self, symbol: &str) -> Option<TokenMetrics> {
        self.state.lock().tokens.get(symbol).cloned()
    }

    /// Symbols tracked by this aggregator
    pub fn tracked_tokens(&self) -> Vec<String> {
        self.state.lock().tokens.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::system::{FixedProbe, ResourceSample};

    fn aggregator(tokens: &[&str]) -> MetricsAggregator {
        MetricsAggregator::with_probe(
            tokens.iter().copied(),
            Box::new(FixedProbe(ResourceSample::default())),
        )
    }

    #[test]
    fn test_running_average() {
        assert_eq!(running_average(0.0, 0, 10.0), 10.0);
        assert_eq!(running_average(10.0, 1, 20.0), 15.0);
        assert_eq!(running_average(15.0, 2, 30.0), 20.0);
    }

    #[test]
    fn test_database_failures_do_not_move_latency() {
        let metrics = aggregator(&["SOL"]);
        metrics.record_database_operation(100.0, true);
        metrics.record_database_operation(9_000.0, false);
        metrics.record_database_operation(300.0, true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.database_latency_ms, 200.0);
        assert_eq!(snapshot.database_operations, 2);
        assert_eq!(snapshot.failed_database_operations, 1);
    }

    #[test]
    fn test_transaction_amounts() {
        let metrics = aggregator(&["SOL"]);
        metrics.record_token_activity("SOL", ActivityKind::Transaction, Some(5.0));
        metrics.record_token_activity("SOL", ActivityKind::Transaction, None);
        metrics.record_token_activity("SOL", ActivityKind::Transaction, Some(15.0));

        let sol = metrics.token("SOL").unwrap();
        assert_eq!(sol.transactions, 3);
        assert_eq!(sol.sized_transactions, 2);
        assert_eq!(sol.average_transaction_size, 10.0);
        assert_eq!(sol.largest_transaction, 15.0);
        assert!(sol.last_activity.is_some());
    }

    #[test]
    fn test_untracked_token_is_dropped() {
        let metrics = aggregator(&["SOL"]);
        metrics.record_token_activity("BONK", ActivityKind::Account, None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tokens.len(), 1);
        assert_eq!(snapshot.tokens["SOL"], TokenMetrics::new("SOL".to_string()));
        assert!(metrics.token("BONK").is_none());
    }

    #[test]
    fn test_snapshot_is_independent_of_later_writes() {
        let metrics = aggregator(&["SOL"]);
        metrics.record_message_processed();
        let before = metrics.snapshot();

        metrics.record_message_processed();
        metrics.record_token_activity("SOL", ActivityKind::Account, None);

        assert_eq!(before.total_messages, 1);
        assert_eq!(before.tokens["SOL"].account_updates, 0);
        assert_eq!(metrics.snapshot().total_messages, 2);
    }

    #[test]
    fn test_counters_and_alert_partitioning() {
        let metrics = aggregator(&[]);
        metrics.record_stream_error();
        metrics.record_stream_error();
        metrics.record_reconnection();
        metrics.record_alert_sent(true);
        metrics.record_alert_sent(false);
        metrics.record_alert_sent(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.stream_errors, 2);
        assert_eq!(snapshot.reconnections, 1);
        assert_eq!(snapshot.alerts_sent, 2);
        assert_eq!(snapshot.alerts_failed, 1);
        assert_eq!(snapshot.alert_failure_rate(), Some(1.0 / 3.0));
        assert_eq!(snapshot.database_failure_rate(), None);
    }

    #[test]
    fn test_processing_time_average() {
        let metrics = aggregator(&[]);
        metrics.record_processing_time(2.0);
        metrics.record_processing_time(4.0);

        assert_eq!(metrics.snapshot().average_processing_time_ms, 3.0);
    }

    #[test]
    fn test_snapshot_uses_probe_sample() {
        let sample = ResourceSample {
            memory: MemoryUsage {
                resident_bytes: 42,
                virtual_bytes: 84,
            },
            cpu_percent: 12.5,
        };
        let metrics = MetricsAggregator::with_probe(["SOL"], Box::new(FixedProbe(sample)));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.memory.resident_bytes, 42);
        assert_eq!(snapshot.cpu_usage_percent, 12.5);
    }
}
