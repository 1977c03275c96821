//! Partitioned dense ranking.
//!
//! Two passes: bucket row indices by partition key and sort each bucket by
//! the ranking column descending, then scan each bucket assigning ranks,
//! incrementing only when the ranking value changes. Tied values share a
//! rank and the next distinct value takes the immediately following
//! integer.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, UInt64Array};
use arrow::compute::take;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use common_error::{BasketError, BasketResult};

use crate::ops::{key_value, KeyValue};
use crate::relation::Relation;

/// Append a dense-rank column, ranking within `partition_by` partitions by
/// `order_by_desc` descending.
///
/// Output rows are grouped by partition (partitions ascending by key);
/// within a partition rows are ordered rank ascending, ties in input
/// order. Callers needing a different final order sort afterwards.
pub fn dense_rank(
    relation: &Relation,
    partition_by: &str,
    order_by_desc: &str,
    out: &str,
) -> BasketResult<Relation> {
    let partition_idx = relation.index_of(partition_by)?;
    let order_idx = relation.index_of(order_by_desc)?;

    if relation.schema().index_of(out).is_ok() {
        return Err(BasketError::invalid_parameter(format!(
            "column {out} already exists"
        )));
    }

    let schema = ranked_schema(relation.schema(), out);
    if relation.is_empty() {
        return Ok(Relation::empty(schema));
    }

    let combined = relation.concat()?;
    let order_array = combined
        .column(order_idx)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| BasketError::type_error("ranking column must be Int64"))?;
    if order_array.null_count() > 0 {
        return Err(BasketError::execution(format!(
            "null value in ranking column {order_by_desc}"
        )));
    }

    // Pass 1: bucket rows by partition key, sort each bucket descending.
    let partition_array = combined.column(partition_idx);
    let mut buckets: HashMap<KeyValue, Vec<usize>> = HashMap::new();
    for row in 0..combined.num_rows() {
        let key = key_value(partition_array, row)?.ok_or_else(|| {
            BasketError::execution(format!("null value in partition column {partition_by}"))
        })?;
        buckets.entry(key).or_default().push(row);
    }

    let mut partitions: Vec<(KeyValue, Vec<usize>)> = buckets.into_iter().collect();
    partitions.sort_by(|(a, _), (b, _)| a.cmp(b));

    // Pass 2: assign ranks per partition.
    let mut take_indices: Vec<u64> = Vec::with_capacity(combined.num_rows());
    let mut ranks: Vec<i64> = Vec::with_capacity(combined.num_rows());
    for (_, mut rows) in partitions {
        rows.sort_by_key(|&row| Reverse(order_array.value(row)));

        let mut rank = 0i64;
        let mut previous: Option<i64> = None;
        for row in rows {
            let value = order_array.value(row);
            if previous != Some(value) {
                rank += 1;
                previous = Some(value);
            }
            take_indices.push(row as u64);
            ranks.push(rank);
        }
    }

    let take_array = UInt64Array::from(take_indices);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for column in combined.columns() {
        columns.push(take(column.as_ref(), &take_array, None)?);
    }
    columns.push(Arc::new(Int64Array::from(ranks)));

    let batch = RecordBatch::try_new(schema, columns)?;
    Ok(Relation::from_batch(batch))
}

fn ranked_schema(input: &SchemaRef, out: &str) -> SchemaRef {
    let mut fields: Vec<Arc<Field>> = input.fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new(out, DataType::Int64, false)));
    Arc::new(Schema::new(fields))
}
