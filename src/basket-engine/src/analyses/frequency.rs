//! Orders placed per user.

use basket_core::{AggSpec, Relation, SortKey};
use common_error::BasketResult;

use crate::aggregate;
use crate::context::ExecutionContext;

/// Artifact name.
pub const NAME: &str = "user_frequency";

/// Count orders per user, most frequent first.
///
/// Ties in `order_count` break ascending by `user_id`.
pub async fn compute(ctx: &ExecutionContext, orders: &Relation) -> BasketResult<Relation> {
    ctx.update_metrics(NAME, |m| m.rows_in = orders.num_rows() as u64);

    let counted = aggregate::grouped(ctx, orders, &["user_id"], &[AggSpec::count("order_count")])
        .await?;

    counted.order_by(&[SortKey::desc("order_count"), SortKey::asc("user_id")])
}
