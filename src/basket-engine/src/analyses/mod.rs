//! The five derived tables.
//!
//! Each analysis is a pure function of the execution context and its
//! input relations, returning the fully sorted output relation. None
//! depends on another's output, so the runner executes them concurrently.
//!
//! | Module | Artifact |
//! |--------|----------|
//! | [`popularity`] | `popular_products` |
//! | [`reorder`] | `reorder_rates_by_department` |
//! | [`hourly`] | `order_hour_patterns` |
//! | [`frequency`] | `user_frequency` |
//! | [`top_aisle`] | `top_aisle_products` |

pub mod frequency;
pub mod hourly;
pub mod popularity;
pub mod reorder;
pub mod top_aisle;

/// Artifact names in the pipeline's canonical reporting order.
pub const ALL: [&str; 5] = [
    popularity::NAME,
    reorder::NAME,
    hourly::NAME,
    frequency::NAME,
    top_aisle::NAME,
];
