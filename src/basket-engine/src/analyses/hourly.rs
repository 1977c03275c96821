//! Order volume by hour of day.

use basket_core::{AggSpec, Relation, SortKey};
use common_error::BasketResult;

use crate::aggregate;
use crate::context::ExecutionContext;

/// Artifact name.
pub const NAME: &str = "order_hour_patterns";

/// Count orders per `order_hour_of_day`, ascending by hour.
///
/// Hours with no orders are absent from the output — at most 24 rows.
pub async fn compute(ctx: &ExecutionContext, orders: &Relation) -> BasketResult<Relation> {
    ctx.update_metrics(NAME, |m| m.rows_in = orders.num_rows() as u64);

    let counted = aggregate::grouped(
        ctx,
        orders,
        &["order_hour_of_day"],
        &[AggSpec::count("order_count")],
    )
    .await?;

    counted.order_by(&[SortKey::asc("order_hour_of_day")])
}
