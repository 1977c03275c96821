//! Execution context passed to every analysis.

use std::sync::Arc;

use common_config::ExecutionConfig;

use crate::memory::{MemoryManager, TrackingMemoryManager};
use crate::metrics::MetricsSink;

/// Runtime configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of blocking workers used for partitioned aggregation.
    pub worker_parallelism: usize,
    /// Memory budget in bytes (0 = unlimited).
    pub memory_budget: usize,
    /// Enable metrics collection.
    pub collect_metrics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_parallelism: 1,
            memory_budget: 0,
            collect_metrics: true,
        }
    }
}

impl RuntimeConfig {
    /// Set worker parallelism.
    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.worker_parallelism = workers.max(1);
        self
    }

    /// Set the memory budget.
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = bytes;
        self
    }

    /// Enable or disable metrics collection.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.collect_metrics = enabled;
        self
    }
}

impl From<&ExecutionConfig> for RuntimeConfig {
    fn from(config: &ExecutionConfig) -> Self {
        let mut runtime = Self::default();
        if let Some(parallelism) = config.parallelism {
            runtime = runtime.with_parallelism(parallelism);
        }
        if let Some(limit) = config.memory_limit {
            runtime = runtime.with_memory_budget(limit);
        }
        runtime
    }
}

/// Context shared by all analyses of one run.
///
/// The context is read-only to analyses: configuration, memory accounting
/// and the metrics sink. There is no process-wide state; everything an
/// analysis needs arrives through its arguments.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Runtime configuration.
    pub config: RuntimeConfig,
    /// Memory manager for accounting against the budget.
    pub memory: Arc<dyn MemoryManager>,
    /// Metrics sink (None when collection is disabled).
    pub metrics: Option<MetricsSink>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("config", &self.config)
            .field("memory_used", &self.memory.used())
            .field("metrics_enabled", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl ExecutionContext {
    /// Create a context from a runtime configuration.
    ///
    /// A tracking memory manager is installed, limited when the config
    /// carries a budget.
    pub fn new(config: RuntimeConfig) -> Self {
        let memory: Arc<dyn MemoryManager> = if config.memory_budget > 0 {
            Arc::new(TrackingMemoryManager::new(config.memory_budget))
        } else {
            Arc::new(TrackingMemoryManager::unlimited())
        };
        let metrics = config.collect_metrics.then(MetricsSink::new);

        Self {
            config,
            memory,
            metrics,
        }
    }

    /// Replace the memory manager.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryManager>) -> Self {
        self.memory = memory;
        self
    }

    /// Disable metrics collection.
    pub fn without_metrics(mut self) -> Self {
        self.metrics = None;
        self
    }

    /// Update an analysis' metrics, if collection is enabled.
    pub fn update_metrics<F>(&self, name: &str, f: F)
    where
        F: FnOnce(&mut crate::metrics::AnalysisMetrics),
    {
        if let Some(ref sink) = self.metrics {
            sink.update(name, f);
        }
    }

    /// Record rows dropped by unresolved join keys.
    pub fn add_dropped_rows(&self, name: &str, dropped: usize) {
        if dropped > 0 {
            log::debug!("{name}: {dropped} rows dropped by unresolved join keys");
        }
        self.update_metrics(name, |m| m.dropped_rows += dropped as u64);
    }
}
