//! Partitioned aggregation.
//!
//! Splits a relation's batches across blocking workers, folds each chunk
//! into a partial [`GroupByState`], merges the partials and finishes once.
//! Counts and sums combine by addition, so the result is identical to the
//! single-pass path; derived ratios are computed by callers only after
//! this function returns.

use basket_core::{AggSpec, GroupByState, Relation};
use common_error::{BasketError, BasketResult};

use crate::context::ExecutionContext;

/// Group-by aggregation using the context's worker parallelism.
///
/// Falls back to the single-pass path when one worker is configured or
/// the relation has fewer than two batches.
pub async fn grouped(
    ctx: &ExecutionContext,
    relation: &Relation,
    keys: &[&str],
    aggs: &[AggSpec],
) -> BasketResult<Relation> {
    let workers = ctx.config.worker_parallelism.max(1);
    if workers <= 1 || relation.batches().len() < 2 {
        return relation.group_by(keys, aggs);
    }

    let key_names: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
    let chunk_size = relation.batches().len().div_ceil(workers);

    let mut join_set = tokio::task::JoinSet::new();
    for chunk in relation.batches().chunks(chunk_size) {
        let batches = chunk.to_vec();
        let keys = key_names.clone();
        let aggs = aggs.to_vec();
        join_set.spawn_blocking(move || {
            let mut state = GroupByState::new(keys, aggs);
            for batch in &batches {
                state.update_batch(batch)?;
            }
            Ok::<_, BasketError>(state)
        });
    }

    let mut merged: Option<GroupByState> = None;
    while let Some(result) = join_set.join_next().await {
        let partial = result
            .map_err(|e| BasketError::execution(format!("aggregation worker failed: {e}")))??;
        match merged.as_mut() {
            Some(state) => state.merge(partial)?,
            None => merged = Some(partial),
        }
    }

    match merged {
        Some(state) => state.finish(relation.schema()),
        None => relation.group_by(keys, aggs),
    }
}
