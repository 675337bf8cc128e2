//! Property tests for running aggregates

use proptest::prelude::*;
use solstream_monitor::monitoring::{
    FixedProbe, HealthStatus, HealthThresholds, MetricsAggregator, ResourceSample,
};
use solstream_monitor::ActivityKind;

fn aggregator() -> MetricsAggregator {
    MetricsAggregator::with_probe(["SOL", "USDC"], Box::new(FixedProbe(ResourceSample::default())))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * b.abs().max(1.0)
}

proptest! {
    #[test]
    fn database_latency_is_mean_of_successes(
        ops in prop::collection::vec((0.0f64..10_000.0, any::<bool>()), 1..200)
    ) {
        let metrics = aggregator();
        for (latency, success) in &ops {
            metrics.record_database_operation(*latency, *success);
        }

        let successes: Vec<f64> = ops.iter().filter(|(_, ok)| *ok).map(|(l, _)| *l).collect();
        let snapshot = metrics.snapshot();

        prop_assert_eq!(snapshot.database_operations, successes.len() as u64);
        prop_assert_eq!(snapshot.failed_database_operations, (ops.len() - successes.len()) as u64);
        if successes.is_empty() {
            prop_assert_eq!(snapshot.database_latency_ms, 0.0);
        } else {
            let mean = successes.iter().sum::<f64>() / successes.len() as f64;
            prop_assert!(close(snapshot.database_latency_ms, mean));
        }
    }

    #[test]
    fn transaction_size_tracks_mean_and_max(
        amounts in prop::collection::vec(prop::option::of(0.0f64..1_000_000.0), 1..200)
    ) {
        let metrics = aggregator();
        for amount in &amounts {
            metrics.record_token_activity("USDC", ActivityKind::Transaction, *amount);
        }

        let sized: Vec<f64> = amounts.iter().flatten().copied().collect();
        let usdc = metrics.token("USDC").unwrap();

        prop_assert_eq!(usdc.transactions, amounts.len() as u64);
        prop_assert_eq!(usdc.sized_transactions, sized.len() as u64);
        if !sized.is_empty() {
            let mean = sized.iter().sum::<f64>() / sized.len() as f64;
            let max = sized.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(close(usdc.average_transaction_size, mean));
            prop_assert_eq!(usdc.largest_transaction, max);
        }

        // Activity on one token never leaks into another
        prop_assert_eq!(metrics.token("SOL").unwrap().transactions, 0);
    }

    #[test]
    fn database_failure_rate_above_threshold_is_critical(
        ok in 0u64..50,
        failed in 1u64..50,
    ) {
        let metrics = aggregator();
        for _ in 0..ok {
            metrics.record_database_operation(1.0, true);
        }
        for _ in 0..failed {
            metrics.record_database_operation(1.0, false);
        }

        let thresholds = HealthThresholds::default();
        let health = solstream_monitor::monitoring::classify(&metrics.snapshot(), &thresholds);
        let rate = failed as f64 / (ok + failed) as f64;

        if rate > thresholds.max_error_rate {
            prop_assert_eq!(health.services.database, HealthStatus::Critical);
        } else {
            prop_assert_eq!(health.services.database, HealthStatus::Healthy);
        }
        prop_assert_eq!(health.services.alert_system, HealthStatus::Healthy);
    }
}
