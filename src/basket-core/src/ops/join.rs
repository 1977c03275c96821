//! Inner hash join on a shared key column.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, UInt64Array};
use arrow::compute::take;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use common_error::{BasketError, BasketResult};

use crate::ops::{key_value, KeyValue};
use crate::relation::Relation;

/// Result of an inner join.
#[derive(Debug)]
pub struct JoinOutput {
    /// The joined relation: left columns, then right columns minus the key.
    pub relation: Relation,
    /// Probe-side rows dropped because their key had no match (or was
    /// null). Not a fault; surfaced so callers can report it.
    pub dropped_rows: usize,
}

/// Inner hash join of `left` and `right` on a column both sides name `key`.
///
/// The right side is the build side (dimension tables are small); the key
/// column appears once in the output. A right-side key occurring on
/// multiple rows matches each of them.
pub fn inner_join(left: &Relation, right: &Relation, key: &str) -> BasketResult<JoinOutput> {
    let left_key_idx = left.index_of(key)?;
    let right_key_idx = right.index_of(key)?;

    let left_field = left.schema().field(left_key_idx);
    let right_field = right.schema().field(right_key_idx);
    if left_field.data_type() != right_field.data_type() {
        return Err(BasketError::schema_mismatch(format!(
            "join key {key} has type {:?} on the left and {:?} on the right",
            left_field.data_type(),
            right_field.data_type()
        )));
    }

    // Right columns carried into the output (all but the key) must not
    // collide with left column names.
    for (idx, field) in right.schema().fields().iter().enumerate() {
        if idx != right_key_idx && left.schema().index_of(field.name()).is_ok() {
            return Err(BasketError::schema_mismatch(format!(
                "column {} exists on both sides of the join",
                field.name()
            )));
        }
    }

    let left_batch = left.concat()?;
    let right_batch = right.concat()?;

    // Build: key -> right row indices.
    let right_key = right_batch.column(right_key_idx);
    let mut build: HashMap<KeyValue, Vec<u64>> = HashMap::new();
    for row in 0..right_batch.num_rows() {
        if let Some(value) = key_value(right_key, row)? {
            build.entry(value).or_default().push(row as u64);
        }
    }

    // Probe.
    let left_key = left_batch.column(left_key_idx);
    let mut left_indices: Vec<u64> = Vec::new();
    let mut right_indices: Vec<u64> = Vec::new();
    let mut dropped_rows = 0usize;
    for row in 0..left_batch.num_rows() {
        match key_value(left_key, row)?.and_then(|v| build.get(&v)) {
            Some(matches) => {
                for &right_row in matches {
                    left_indices.push(row as u64);
                    right_indices.push(right_row);
                }
            }
            None => dropped_rows += 1,
        }
    }

    let schema = join_schema(left.schema(), right.schema(), right_key_idx);

    let left_take = UInt64Array::from(left_indices);
    let right_take = UInt64Array::from(right_indices);

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for column in left_batch.columns() {
        columns.push(take(column.as_ref(), &left_take, None)?);
    }
    for (idx, column) in right_batch.columns().iter().enumerate() {
        if idx != right_key_idx {
            columns.push(take(column.as_ref(), &right_take, None)?);
        }
    }

    let batch = RecordBatch::try_new(schema, columns)?;
    Ok(JoinOutput {
        relation: Relation::from_batch(batch),
        dropped_rows,
    })
}

fn join_schema(left: &SchemaRef, right: &SchemaRef, right_key_idx: usize) -> SchemaRef {
    let mut fields: Vec<Arc<Field>> = left.fields().iter().cloned().collect();
    for (idx, field) in right.fields().iter().enumerate() {
        if idx != right_key_idx {
            fields.push(field.clone());
        }
    }
    Arc::new(Schema::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{int_col, int_values, relation_of, str_col, str_values};

    fn products() -> Relation {
        relation_of(&[
            ("product_id", int_col(&[1, 2])),
            ("product_name", str_col(&["Banana", "Bread"])),
            ("aisle_id", int_col(&[10, 20])),
        ])
    }

    #[test]
    fn test_inner_join_basic() {
        let counts = relation_of(&[
            ("product_id", int_col(&[1, 2, 1])),
            ("order_count", int_col(&[5, 3, 2])),
        ]);

        let out = counts.inner_join(&products(), "product_id").unwrap();
        assert_eq!(out.dropped_rows, 0);

        let joined = out.relation;
        assert_eq!(joined.num_rows(), 3);
        assert_eq!(
            joined
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().as_str())
                .collect::<Vec<_>>(),
            vec!["product_id", "order_count", "product_name", "aisle_id"]
        );
        assert_eq!(str_values(&joined, "product_name"), vec!["Banana", "Bread", "Banana"]);
    }

    #[test]
    fn test_inner_join_drops_unresolved_keys() {
        let counts = relation_of(&[
            ("product_id", int_col(&[1, 99, 2, 98])),
            ("order_count", int_col(&[5, 1, 3, 1])),
        ]);

        let out = counts.inner_join(&products(), "product_id").unwrap();
        assert_eq!(out.dropped_rows, 2);
        assert_eq!(int_values(&out.relation, "product_id"), vec![1, 2]);
    }

    #[test]
    fn test_inner_join_missing_key_column() {
        let counts = relation_of(&[("other", int_col(&[1]))]);
        let err = counts.inner_join(&products(), "product_id").unwrap_err();
        assert!(matches!(err, BasketError::ColumnNotFound(_)));
    }

    #[test]
    fn test_inner_join_column_collision() {
        let counts = relation_of(&[
            ("product_id", int_col(&[1])),
            ("aisle_id", int_col(&[7])),
        ]);
        let err = counts.inner_join(&products(), "product_id").unwrap_err();
        assert!(matches!(err, BasketError::SchemaMismatch(_)));
    }

    #[test]
    fn test_inner_join_key_type_mismatch() {
        let counts = relation_of(&[("product_id", str_col(&["1"]))]);
        let err = counts.inner_join(&products(), "product_id").unwrap_err();
        assert!(matches!(err, BasketError::SchemaMismatch(_)));
    }
}
