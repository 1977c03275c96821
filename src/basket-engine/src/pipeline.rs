//! The batch pipeline runner.
//!
//! Loads the six input tables once, builds the unified order-item
//! relation, then runs all five analyses concurrently. Analyses are
//! isolated: one failing is reported in its [`AnalysisReport`] and does
//! not stop the others from computing and materializing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use basket_core::Relation;
use basket_storage::{Materializer, TableLoader};
use common_error::{BasketError, BasketResult};

use crate::analyses;
use crate::context::ExecutionContext;
use crate::memory::MemoryReservation;
use crate::unify::unify_order_items;

/// Outcome of one analysis within a pipeline run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Artifact name.
    pub name: &'static str,
    /// Rows materialized (0 on failure).
    pub rows: usize,
    /// Wall time for compute plus materialization.
    pub elapsed: Duration,
    /// Failure description, if the analysis failed.
    pub error: Option<String>,
}

impl AnalysisReport {
    /// True if the analysis computed and materialized successfully.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    fn failed(name: &'static str, error: String) -> Self {
        Self {
            name,
            rows: 0,
            elapsed: Duration::ZERO,
            error: Some(error),
        }
    }
}

/// Run the whole pipeline: load, unify, compute and materialize all five
/// analyses concurrently.
///
/// Returns one report per analysis in canonical order. Load failures and
/// an exceeded memory budget abort the run; per-analysis failures do not.
pub async fn run_pipeline(
    ctx: &ExecutionContext,
    loader: &dyn TableLoader,
    materializer: Arc<dyn Materializer>,
) -> BasketResult<Vec<AnalysisReport>> {
    let tables = loader.load().await?;
    let table_bytes = tables.memory_bytes();
    let _reservation = MemoryReservation::try_new(Arc::clone(&ctx.memory), table_bytes)?;
    log::info!("loaded input tables ({table_bytes} bytes)");

    let tables = Arc::new(tables);
    let (unified, union_error) =
        match unify_order_items(&tables.order_items_prior, &tables.order_items_train) {
            Ok(relation) => (Some(Arc::new(relation)), None),
            Err(e) => {
                log::error!("order-item union failed: {e}");
                (None, Some(e.to_string()))
            }
        };

    let mut reports: Vec<AnalysisReport> = Vec::with_capacity(analyses::ALL.len());
    let mut join_set = tokio::task::JoinSet::new();

    if let Some(unified) = &unified {
        {
            let ctx = ctx.clone();
            let tables = Arc::clone(&tables);
            let unified = Arc::clone(unified);
            let materializer = Arc::clone(&materializer);
            join_set.spawn(async move {
                let compute = analyses::popularity::compute(
                    &ctx,
                    &unified,
                    &tables.products,
                    &tables.aisles,
                    &tables.departments,
                );
                run_analysis(analyses::popularity::NAME, &ctx, materializer.as_ref(), compute)
                    .await
            });
        }
        {
            let ctx = ctx.clone();
            let tables = Arc::clone(&tables);
            let unified = Arc::clone(unified);
            let materializer = Arc::clone(&materializer);
            join_set.spawn(async move {
                let compute = analyses::reorder::compute(
                    &ctx,
                    &unified,
                    &tables.products,
                    &tables.departments,
                );
                run_analysis(analyses::reorder::NAME, &ctx, materializer.as_ref(), compute).await
            });
        }
        {
            let ctx = ctx.clone();
            let tables = Arc::clone(&tables);
            let unified = Arc::clone(unified);
            let materializer = Arc::clone(&materializer);
            join_set.spawn(async move {
                let compute = analyses::top_aisle::compute(
                    &ctx,
                    &unified,
                    &tables.products,
                    &tables.aisles,
                );
                run_analysis(analyses::top_aisle::NAME, &ctx, materializer.as_ref(), compute)
                    .await
            });
        }
    } else if let Some(error) = union_error {
        // The three item-based analyses cannot run; the order-based ones
        // still can.
        for name in [
            analyses::popularity::NAME,
            analyses::reorder::NAME,
            analyses::top_aisle::NAME,
        ] {
            reports.push(AnalysisReport::failed(name, error.clone()));
        }
    }

    {
        let ctx = ctx.clone();
        let tables = Arc::clone(&tables);
        let materializer = Arc::clone(&materializer);
        join_set.spawn(async move {
            let compute = analyses::hourly::compute(&ctx, &tables.orders);
            run_analysis(analyses::hourly::NAME, &ctx, materializer.as_ref(), compute).await
        });
    }
    {
        let ctx = ctx.clone();
        let tables = Arc::clone(&tables);
        let materializer = Arc::clone(&materializer);
        join_set.spawn(async move {
            let compute = analyses::frequency::compute(&ctx, &tables.orders);
            run_analysis(analyses::frequency::NAME, &ctx, materializer.as_ref(), compute).await
        });
    }

    while let Some(joined) = join_set.join_next().await {
        let report = joined
            .map_err(|e| BasketError::execution(format!("analysis task failed: {e}")))?;
        reports.push(report);
    }

    reports.sort_by_key(|report| {
        analyses::ALL
            .iter()
            .position(|name| *name == report.name)
            .unwrap_or(usize::MAX)
    });
    Ok(reports)
}

/// Drive one analysis to a report: compute, materialize, time, record.
async fn run_analysis<F>(
    name: &'static str,
    ctx: &ExecutionContext,
    materializer: &dyn Materializer,
    compute: F,
) -> AnalysisReport
where
    F: std::future::Future<Output = BasketResult<Relation>>,
{
    let start = Instant::now();
    let result = async {
        let relation = compute.await?;
        materializer.materialize(name, &relation).await?;
        Ok::<usize, BasketError>(relation.num_rows())
    }
    .await;
    let elapsed = start.elapsed();

    match result {
        Ok(rows) => {
            ctx.update_metrics(name, |m| {
                m.rows_out = rows as u64;
                m.elapsed = elapsed;
            });
            log::info!("{name}: {rows} rows in {elapsed:?}");
            AnalysisReport {
                name,
                rows,
                elapsed,
                error: None,
            }
        }
        Err(e) => {
            ctx.update_metrics(name, |m| m.elapsed = elapsed);
            log::error!("{name} failed: {e}");
            AnalysisReport {
                name,
                rows: 0,
                elapsed,
                error: Some(e.to_string()),
            }
        }
    }
}
