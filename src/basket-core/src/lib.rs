//! Core relation layer for Basket.
//!
//! This crate provides the [`Relation`] value type — an immutable, typed
//! table backed by Arrow `RecordBatch`es — and the relational operations
//! the analytical pipeline is composed from: union, filter, projection,
//! derived columns, hash aggregation, hash joins, total sorts and
//! partitioned dense ranking.
//!
//! Every operation is a pure function: it consumes references and returns
//! a new [`Relation`], so stages compose freely and are testable in
//! isolation.

#![allow(clippy::cast_possible_wrap, clippy::cast_precision_loss, clippy::cast_sign_loss)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]

pub mod ops;
pub mod relation;
pub mod schema;
pub mod testing;

pub use ops::aggregate::{AggFunc, AggSpec, GroupByState};
pub use ops::join::JoinOutput;
pub use ops::sort::SortKey;
pub use ops::KeyValue;
pub use relation::Relation;
