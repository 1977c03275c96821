//! Average product reorder rate per department.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Builder, Int64Array};
use arrow::datatypes::DataType;

use basket_core::{AggSpec, Relation, SortKey};
use common_error::{BasketError, BasketResult};

use crate::aggregate;
use crate::context::ExecutionContext;

/// Artifact name.
pub const NAME: &str = "reorder_rates_by_department";

/// Two-stage aggregation: per-product reorder rate, then the plain mean
/// of those rates per department.
///
/// Each product weighs equally in its department's average regardless of
/// order volume. The per-product rate is derived only after all partial
/// counts are combined, never re-averaged from partials. Ties in
/// `avg_reorder_rate` break ascending by `department_id`.
pub async fn compute(
    ctx: &ExecutionContext,
    unified: &Relation,
    products: &Relation,
    departments: &Relation,
) -> BasketResult<Relation> {
    ctx.update_metrics(NAME, |m| m.rows_in = unified.num_rows() as u64);

    let per_product = aggregate::grouped(
        ctx,
        unified,
        &["product_id"],
        &[
            AggSpec::count("total_orders"),
            AggSpec::sum("reordered", "reorder_count"),
        ],
    )
    .await?;

    // total_orders >= 1 for every emitted group, so the division is safe.
    let with_rate = per_product.with_column("reorder_rate", DataType::Float64, false, |batch| {
        let totals = int_column(batch, "total_orders")?;
        let reorders = int_column(batch, "reorder_count")?;

        let mut builder = Float64Builder::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            builder.append_value(reorders.value(row) as f64 / totals.value(row) as f64);
        }
        Ok(Arc::new(builder.finish()) as ArrayRef)
    })?;

    let joined = with_rate.inner_join(products, "product_id")?;
    ctx.add_dropped_rows(NAME, joined.dropped_rows);
    let joined = joined.relation.inner_join(departments, "department_id")?;
    ctx.add_dropped_rows(NAME, joined.dropped_rows);

    let per_department = aggregate::grouped(
        ctx,
        &joined.relation,
        &["department_id", "department"],
        &[AggSpec::avg("reorder_rate", "avg_reorder_rate")],
    )
    .await?;

    per_department.order_by(&[
        SortKey::desc("avg_reorder_rate"),
        SortKey::asc("department_id"),
    ])
}

fn int_column<'a>(
    batch: &'a arrow::record_batch::RecordBatch,
    name: &str,
) -> BasketResult<&'a Int64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| BasketError::column_not_found(name))?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| BasketError::type_error(format!("{name} must be Int64")))
}

#[cfg(test)]
mod tests {
    use basket_core::testing::{float_values, int_col, int_values, relation_of, str_col, str_values};

    use super::*;

    fn products() -> Relation {
        relation_of(&[
            ("product_id", int_col(&[1, 2, 3])),
            ("product_name", str_col(&["Banana", "Apple", "Bread"])),
            ("aisle_id", int_col(&[1, 1, 2])),
            ("department_id", int_col(&[1, 1, 2])),
        ])
    }

    fn departments() -> Relation {
        relation_of(&[
            ("department_id", int_col(&[1, 2])),
            ("department", str_col(&["produce", "bakery"])),
        ])
    }

    #[tokio::test]
    async fn test_banana_scenario() {
        // Product 1 ordered three times, reordered twice -> rate 2/3.
        let unified = relation_of(&[
            ("order_id", int_col(&[1, 2, 3])),
            ("product_id", int_col(&[1, 1, 1])),
            ("reordered", int_col(&[1, 0, 1])),
        ]);
        let products = relation_of(&[
            ("product_id", int_col(&[1])),
            ("product_name", str_col(&["Banana"])),
            ("aisle_id", int_col(&[1])),
            ("department_id", int_col(&[1])),
        ]);
        let departments = relation_of(&[
            ("department_id", int_col(&[1])),
            ("department", str_col(&["produce"])),
        ]);

        let ctx = ExecutionContext::default();
        let out = compute(&ctx, &unified, &products, &departments).await.unwrap();

        assert_eq!(int_values(&out, "department_id"), vec![1]);
        assert_eq!(str_values(&out, "department"), vec!["produce"]);
        assert_eq!(float_values(&out, "avg_reorder_rate"), vec![2.0 / 3.0]);
    }

    #[tokio::test]
    async fn test_products_weigh_equally_within_department() {
        // Department 1: product 1 with rate 1.0 over one order, product 2
        // with rate 0.0 over three orders. The plain mean is 0.5 — the
        // heavy product does not dominate.
        let unified = relation_of(&[
            ("order_id", int_col(&[1, 2, 3, 4])),
            ("product_id", int_col(&[1, 2, 2, 2])),
            ("reordered", int_col(&[1, 0, 0, 0])),
        ]);

        let ctx = ExecutionContext::default();
        let out = compute(&ctx, &unified, &products(), &departments())
            .await
            .unwrap();

        assert_eq!(int_values(&out, "department_id"), vec![1]);
        assert_eq!(float_values(&out, "avg_reorder_rate"), vec![0.5]);
    }

    #[tokio::test]
    async fn test_sorted_descending_by_rate() {
        // Department 1 averages 0.25; department 2 averages 1.0.
        let unified = relation_of(&[
            ("order_id", int_col(&[1, 2, 3, 4, 5])),
            ("product_id", int_col(&[1, 1, 1, 1, 3])),
            ("reordered", int_col(&[1, 0, 0, 0, 1])),
        ]);

        let ctx = ExecutionContext::default();
        let out = compute(&ctx, &unified, &products(), &departments())
            .await
            .unwrap();

        assert_eq!(int_values(&out, "department_id"), vec![2, 1]);
        assert_eq!(str_values(&out, "department"), vec!["bakery", "produce"]);
        assert_eq!(float_values(&out, "avg_reorder_rate"), vec![1.0, 0.25]);
    }

    #[tokio::test]
    async fn test_rates_stay_within_unit_interval() {
        let unified = relation_of(&[
            ("order_id", int_col(&[1, 2, 3, 4, 5, 6])),
            ("product_id", int_col(&[1, 1, 2, 2, 3, 3])),
            ("reordered", int_col(&[1, 1, 0, 1, 0, 0])),
        ]);

        let ctx = ExecutionContext::default();
        let out = compute(&ctx, &unified, &products(), &departments())
            .await
            .unwrap();

        for rate in float_values(&out, "avg_reorder_rate") {
            assert!((0.0..=1.0).contains(&rate));
        }
    }
}
