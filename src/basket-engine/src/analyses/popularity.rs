//! Most popular products across all orders.

use basket_core::{AggSpec, Relation, SortKey};
use common_error::BasketResult;

use crate::aggregate;
use crate::context::ExecutionContext;

/// Artifact name.
pub const NAME: &str = "popular_products";

/// Count orders per product, attach the product's aisle and department
/// names, sort by popularity.
///
/// Items whose product, aisle or department id does not resolve are
/// dropped (inner-join semantics); the drop count lands in the metrics.
/// Ties in `order_count` break ascending by `product_id`.
pub async fn compute(
    ctx: &ExecutionContext,
    unified: &Relation,
    products: &Relation,
    aisles: &Relation,
    departments: &Relation,
) -> BasketResult<Relation> {
    ctx.update_metrics(NAME, |m| m.rows_in = unified.num_rows() as u64);

    let counted = aggregate::grouped(
        ctx,
        unified,
        &["product_id"],
        &[AggSpec::count("order_count")],
    )
    .await?;

    let joined = counted.inner_join(products, "product_id")?;
    ctx.add_dropped_rows(NAME, joined.dropped_rows);
    let joined = joined.relation.inner_join(aisles, "aisle_id")?;
    ctx.add_dropped_rows(NAME, joined.dropped_rows);
    let joined = joined.relation.inner_join(departments, "department_id")?;
    ctx.add_dropped_rows(NAME, joined.dropped_rows);

    joined
        .relation
        .select(&[
            "product_id",
            "product_name",
            "aisle",
            "department",
            "order_count",
        ])?
        .order_by(&[SortKey::desc("order_count"), SortKey::asc("product_id")])
}
