//! Union builder for the two order-item relations.

use arrow::compute::cast;
use arrow::datatypes::DataType;

use basket_core::Relation;
use common_error::{BasketError, BasketResult};

/// Merge the prior and train order-item relations into one.
///
/// Each side gains a `data_source` column before the union. The column
/// holds the string form of the row's `reordered` flag ("0"/"1"), not a
/// prior/train provenance tag. Nothing downstream consumes it.
///
/// Output cardinality is exactly the sum of the two inputs; a schema
/// difference between them fails with `SchemaMismatch`.
pub fn unify_order_items(prior: &Relation, train: &Relation) -> BasketResult<Relation> {
    let prior = with_data_source(prior)?;
    let train = with_data_source(train)?;
    prior.union_all(&train)
}

fn with_data_source(items: &Relation) -> BasketResult<Relation> {
    items.with_column("data_source", DataType::Utf8, false, |batch| {
        let reordered = batch
            .column_by_name("reordered")
            .ok_or_else(|| BasketError::column_not_found("reordered"))?;
        cast(reordered, &DataType::Utf8).map_err(BasketError::from)
    })
}
