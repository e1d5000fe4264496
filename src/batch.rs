//! Settle-all fan-out in fixed-size batches.

use std::future::Future;

/// Run `task` over `items`, at most `batch_size` at a time. Each batch is
/// awaited in full before the next starts; a failing task never cancels
/// its siblings. Outcomes come back paired with their input, in input
/// order.
pub async fn settle_in_batches<T, R, E, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    task: F,
) -> Vec<(T, Result<R, E>)>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let batch_size = batch_size.max(1);
    let mut settled = Vec::with_capacity(items.len());
    for (index, batch) in items.chunks(batch_size).enumerate() {
        let outcomes = futures::future::join_all(batch.iter().cloned().map(&task)).await;
        tracing::debug!(
            target: "item_hierarchy.batch",
            batch = index,
            size = batch.len(),
            failed = outcomes.iter().filter(|o| o.is_err()).count(),
            "batch settled"
        );
        settled.extend(batch.iter().cloned().zip(outcomes));
    }
    settled
}
