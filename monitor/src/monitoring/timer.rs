//! In-flight operation timers
//!
//! Tracks named operations between start and stop. The registry only measures
//! elapsed time; callers decide what a duration means and hand it to the
//! aggregator themselves.

use dashmap::DashMap;
use std::time::Instant;
use tracing::trace;

/// A started, not yet stopped, operation
#[derive(Debug, Clone)]
pub struct TimerEntry {
    /// When the operation started
    pub started_at: Instant,

    /// Operation label
    pub label: String,
}

/// Registry of in-flight timers keyed by caller-supplied id
#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: DashMap<String, TimerEntry>,
}

impl TimerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the timer for `id`
    pub fn start_timer(&self, id: impl Into<String>, label: impl Into<String>) {
        let id = id.into();
        let label = label.into();
        trace!(timer = %id, label = %label, "Timer started");

        self.timers.insert(
            id,
            TimerEntry {
                started_at: Instant::now(),
                label,
            },
        );
    }

    /// Start a timer under a freshly generated id and return the id
    pub fn begin(&self, label: impl Into<String>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.start_timer(id.clone(), label);
        id
    }

    /// Stop the timer for `id` and return the elapsed milliseconds.
    ///
    /// Unknown ids yield `0.0`.
    pub fn stop_timer(&self, id: &str) -> f64 {
        self.try_stop(id).unwrap_or(0.0)
    }

    /// Stop the timer for `id`, or `None` if it was never started
    pub fn try_stop(&self, id: &str) -> Option<f64> {
        let (_, entry) = self.timers.remove(id)?;
        let elapsed_ms = entry.started_at.elapsed().as_secs_f64() * 1000.0;
        trace!(timer = %id, label = %entry.label, elapsed_ms, "Timer stopped");
        Some(elapsed_ms)
    }

    /// Number of timers currently running
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Label of a running timer
    pub fn label(&self, id: &str) -> Option<String> {
        self.timers.get(id).map(|entry| entry.label.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stop_unknown_timer_returns_zero() {
        let registry = TimerRegistry::new();
        registry.start_timer("db-write", "database");

        assert_eq!(registry.stop_timer("never-started"), 0.0);
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.label("db-write").as_deref(), Some("database"));
    }

    #[test]
    fn test_try_stop_distinguishes_unknown_ids() {
        let registry = TimerRegistry::new();
        registry.start_timer("op", "processing");

        assert_eq!(registry.try_stop("missing"), None);
        assert!(registry.try_stop("op").is_some());
        assert_eq!(registry.try_stop("op"), None);
    }

    #[test]
    fn test_stop_removes_entry() {
        let registry = TimerRegistry::new();
        registry.start_timer("op", "processing");
        std::thread::sleep(Duration::from_millis(5));

        let elapsed = registry.stop_timer("op");
        assert!(elapsed >= 5.0);
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.stop_timer("op"), 0.0);
    }

    #[test]
    fn test_restart_overwrites_entry() {
        let registry = TimerRegistry::new();
        registry.start_timer("op", "first");
        std::thread::sleep(Duration::from_millis(20));
        registry.start_timer("op", "second");

        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.label("op").as_deref(), Some("second"));
        assert!(registry.stop_timer("op") < 20.0);
    }

    #[test]
    fn test_begin_generates_unique_ids() {
        let registry = TimerRegistry::new();
        let a = registry.begin("webhook");
        let b = registry.begin("webhook");

        assert_ne!(a, b);
        assert_eq!(registry.active_count(), 2);
    }
}
