//! Top products per aisle by dense rank.

use arrow::array::{Array, Int64Array};

use basket_core::{AggSpec, Relation, SortKey};
use common_error::{BasketError, BasketResult};

use crate::aggregate;
use crate::context::ExecutionContext;

/// Artifact name.
pub const NAME: &str = "top_aisle_products";

/// Rank cutoff: rows ranked deeper than this are discarded.
const TOP_K: i64 = 5;

/// Count items per product, rank products within their aisle by count
/// descending (dense ranking), keep ranks 1..=5, sort by aisle then rank.
///
/// The cutoff is on the rank, not the row count: an aisle tied at rank 5
/// keeps every tied row, and an aisle with fewer products emits fewer
/// rows. Rows tied on aisle and rank order ascending by `product_id`.
pub async fn compute(
    ctx: &ExecutionContext,
    unified: &Relation,
    products: &Relation,
    aisles: &Relation,
) -> BasketResult<Relation> {
    ctx.update_metrics(NAME, |m| m.rows_in = unified.num_rows() as u64);

    let counted = aggregate::grouped(
        ctx,
        unified,
        &["product_id"],
        &[AggSpec::count("product_count")],
    )
    .await?;

    let joined = counted.inner_join(products, "product_id")?;
    ctx.add_dropped_rows(NAME, joined.dropped_rows);
    let joined = joined.relation.inner_join(aisles, "aisle_id")?;
    ctx.add_dropped_rows(NAME, joined.dropped_rows);

    let ranked = joined
        .relation
        .select(&["aisle_id", "aisle", "product_id", "product_name", "product_count"])?
        .dense_rank("aisle_id", "product_count", "rank")?;

    let top = ranked.filter(|batch| {
        let ranks = batch
            .column_by_name("rank")
            .ok_or_else(|| BasketError::column_not_found("rank"))?
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| BasketError::type_error("rank must be Int64"))?;
        Ok((0..ranks.len()).map(|i| Some(ranks.value(i) <= TOP_K)).collect())
    })?;

    top.order_by(&[
        SortKey::asc("aisle"),
        SortKey::asc("rank"),
        SortKey::asc("product_id"),
    ])
}
