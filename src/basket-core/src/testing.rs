//! Testing utilities shared by the workspace's test suites.
//!
//! Small builders for relations and value extractors for asserting on
//! batch contents.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::Relation;

/// Build an Int64 column.
pub fn int_col(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

/// Build a Float64 column.
pub fn float_col(values: &[f64]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

/// Build a Utf8 column.
pub fn str_col(values: &[&str]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

/// Build a single-batch relation from named columns.
///
/// All fields are declared non-nullable; every column must have the same
/// length.
pub fn relation_of(columns: &[(&str, ArrayRef)]) -> Relation {
    Relation::from_batch(batch_of(columns))
}

/// Build a `RecordBatch` from named columns.
pub fn batch_of(columns: &[(&str, ArrayRef)]) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), false))
        .collect();
    let arrays: Vec<ArrayRef> = columns.iter().map(|(_, array)| array.clone()).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
}

/// Extract a named Int64 column of a relation as a vector.
pub fn int_values(relation: &Relation, column: &str) -> Vec<i64> {
    let batch = relation.concat().unwrap();
    let idx = batch.schema().index_of(column).unwrap();
    let array = batch
        .column(idx)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap_or_else(|| panic!("column {column} is not Int64"));
    (0..array.len()).map(|i| array.value(i)).collect()
}

/// Extract a named Float64 column of a relation as a vector.
pub fn float_values(relation: &Relation, column: &str) -> Vec<f64> {
    let batch = relation.concat().unwrap();
    let idx = batch.schema().index_of(column).unwrap();
    let array = batch
        .column(idx)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap_or_else(|| panic!("column {column} is not Float64"));
    (0..array.len()).map(|i| array.value(i)).collect()
}

/// Extract a named Utf8 column of a relation as a vector.
pub fn str_values(relation: &Relation, column: &str) -> Vec<String> {
    let batch = relation.concat().unwrap();
    let idx = batch.schema().index_of(column).unwrap();
    let array = batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap_or_else(|| panic!("column {column} is not Utf8"));
    (0..array.len()).map(|i| array.value(i).to_string()).collect()
}
