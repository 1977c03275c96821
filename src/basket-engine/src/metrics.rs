//! Per-analysis metrics collection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Metrics for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisMetrics {
    /// Rows consumed from the analysis' primary input.
    pub rows_in: u64,
    /// Rows in the materialized output.
    pub rows_out: u64,
    /// Rows dropped by inner joins whose key did not resolve.
    pub dropped_rows: u64,
    /// Wall time for compute plus materialization.
    pub elapsed: Duration,
}

impl std::fmt::Display for AnalysisMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rows_in={}, rows_out={}, dropped={}, time={:?}",
            self.rows_in, self.rows_out, self.dropped_rows, self.elapsed
        )
    }
}

/// Shared sink collecting metrics by analysis name.
#[derive(Debug, Clone, Default)]
pub struct MetricsSink {
    metrics: Arc<RwLock<HashMap<String, AnalysisMetrics>>>,
}

impl MetricsSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the metrics recorded under `name`.
    pub fn record(&self, name: &str, metrics: AnalysisMetrics) {
        if let Ok(mut map) = self.metrics.write() {
            map.insert(name.to_string(), metrics);
        }
    }

    /// Update the metrics recorded under `name` in place.
    pub fn update<F>(&self, name: &str, f: F)
    where
        F: FnOnce(&mut AnalysisMetrics),
    {
        if let Ok(mut map) = self.metrics.write() {
            f(map.entry(name.to_string()).or_default());
        }
    }

    /// Metrics for one analysis, if recorded.
    pub fn get(&self, name: &str) -> Option<AnalysisMetrics> {
        self.metrics.read().ok()?.get(name).cloned()
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> HashMap<String, AnalysisMetrics> {
        self.metrics.read().map(|m| m.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_get() {
        let sink = MetricsSink::new();
        sink.record(
            "popular_products",
            AnalysisMetrics {
                rows_in: 100,
                rows_out: 10,
                dropped_rows: 2,
                elapsed: Duration::from_millis(5),
            },
        );

        let metrics = sink.get("popular_products").unwrap();
        assert_eq!(metrics.rows_in, 100);
        assert_eq!(metrics.dropped_rows, 2);
    }

    #[test]
    fn test_update_creates_entry() {
        let sink = MetricsSink::new();
        sink.update("user_frequency", |m| m.dropped_rows += 3);
        sink.update("user_frequency", |m| m.dropped_rows += 4);

        assert_eq!(sink.get("user_frequency").unwrap().dropped_rows, 7);
        assert_eq!(sink.snapshot().len(), 1);
    }

    #[test]
    fn test_missing_entry() {
        let sink = MetricsSink::new();
        assert!(sink.get("absent").is_none());
    }
}
