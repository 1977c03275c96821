//! Total sort over a relation.

use arrow::array::ArrayRef;
use arrow::compute::{lexsort_to_indices, take, SortColumn, SortOptions};
use arrow::record_batch::RecordBatch;

use common_error::{BasketError, BasketResult};

use crate::relation::Relation;

/// A single sort key.
#[derive(Debug, Clone)]
pub struct SortKey {
    /// Column to sort by.
    pub column: String,
    /// Ascending (true) or descending (false).
    pub ascending: bool,
    /// Whether nulls sort before non-null values.
    pub nulls_first: bool,
}

impl SortKey {
    /// Ascending sort on a column.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
            nulls_first: false,
        }
    }

    /// Descending sort on a column.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
            nulls_first: false,
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dir = if self.ascending { "asc" } else { "desc" };
        write!(f, "{} {dir}", self.column)
    }
}

/// Sort the whole relation by the given keys.
///
/// Rows tied on every key land in an unspecified order, so callers wanting
/// a reproducible total order must include a distinguishing final key.
pub fn order_by(relation: &Relation, keys: &[SortKey]) -> BasketResult<Relation> {
    if keys.is_empty() {
        return Err(BasketError::invalid_parameter("order_by requires at least one key"));
    }
    if relation.is_empty() {
        return Ok(relation.clone());
    }

    let combined = relation.concat()?;

    let mut sort_columns: Vec<SortColumn> = Vec::with_capacity(keys.len());
    for key in keys {
        let idx = relation.index_of(&key.column)?;
        let options = SortOptions {
            descending: !key.ascending,
            nulls_first: key.nulls_first,
        };
        sort_columns.push(SortColumn {
            values: combined.column(idx).clone(),
            options: Some(options),
        });
    }

    let indices = lexsort_to_indices(&sort_columns, None)?;

    let sorted_columns: Vec<ArrayRef> = combined
        .columns()
        .iter()
        .map(|column| take(column.as_ref(), &indices, None))
        .collect::<Result<Vec<_>, _>>()?;

    let batch = RecordBatch::try_new(combined.schema(), sorted_columns)?;
    Ok(Relation::from_batch(batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{int_col, int_values, relation_of, str_col, str_values};

    fn sample() -> Relation {
        relation_of(&[
            ("id", int_col(&[3, 1, 4, 1, 5])),
            ("name", str_col(&["charlie", "alice", "dave", "bob", "eve"])),
            ("value", int_col(&[300, 100, 400, 150, 500])),
        ])
    }

    #[test]
    fn test_sort_ascending() {
        let out = sample().order_by(&[SortKey::asc("id")]).unwrap();
        assert_eq!(int_values(&out, "id"), vec![1, 1, 3, 4, 5]);
    }

    #[test]
    fn test_sort_descending() {
        let out = sample().order_by(&[SortKey::desc("value")]).unwrap();
        assert_eq!(int_values(&out, "value"), vec![500, 400, 300, 150, 100]);
    }

    #[test]
    fn test_sort_multi_key() {
        let out = sample()
            .order_by(&[SortKey::asc("id"), SortKey::desc("value")])
            .unwrap();

        assert_eq!(int_values(&out, "id"), vec![1, 1, 3, 4, 5]);
        assert_eq!(int_values(&out, "value"), vec![150, 100, 300, 400, 500]);
        assert_eq!(
            str_values(&out, "name"),
            vec!["bob", "alice", "charlie", "dave", "eve"]
        );
    }

    #[test]
    fn test_sort_unknown_column() {
        let err = sample().order_by(&[SortKey::asc("missing")]).unwrap_err();
        assert!(matches!(err, BasketError::ColumnNotFound(_)));
    }

    #[test]
    fn test_sort_empty_relation() {
        let rel = Relation::empty(crate::schema::aisles());
        let out = rel.order_by(&[SortKey::asc("aisle_id")]).unwrap();
        assert_eq!(out.num_rows(), 0);
    }

    #[test]
    fn test_sort_across_batches() {
        let left = relation_of(&[("n", int_col(&[5, 1]))]);
        let right = relation_of(&[("n", int_col(&[3, 2]))]);
        let both = left.union_all(&right).unwrap();

        let out = both.order_by(&[SortKey::asc("n")]).unwrap();
        assert_eq!(int_values(&out, "n"), vec![1, 2, 3, 5]);
    }
}
