//! Execution layer for Basket.
//!
//! This crate turns the relation operations of `basket-core` into the
//! fixed batch pipeline: an explicit [`ExecutionContext`] (configuration,
//! memory accounting, metrics), the order-item union builder, the five
//! analyses, partitioned parallel aggregation, and the fault-isolating
//! [`pipeline`] runner.
//!
//! The five analyses are independent: none consumes another's output, and
//! the runner executes them concurrently. A failure in one is reported and
//! does not prevent the others from materializing.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
#![allow(clippy::uninlined_format_args)]

pub mod aggregate;
pub mod analyses;
pub mod context;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod unify;

pub use context::{ExecutionContext, RuntimeConfig};
pub use memory::{MemoryManager, MemoryReservation, NoopMemoryManager, TrackingMemoryManager};
pub use metrics::{AnalysisMetrics, MetricsSink};
pub use pipeline::{run_pipeline, AnalysisReport};
pub use unify::unify_order_items;
