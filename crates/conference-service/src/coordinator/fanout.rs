//! Bounded-concurrency fan-out.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run `task` for every item with at most `concurrency` in flight.
///
/// Results come back in input order. Each item's outcome is independent:
/// a failing item never cancels or delays the others beyond the bound.
///
/// Items are taken by value so the task futures hold no borrow of the
/// input; callers clone what they still need afterwards.
pub async fn fan_out<T, F, Fut, O>(items: Vec<T>, concurrency: usize, task: F) -> Vec<O>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = O>,
{
    let tasks: Vec<Fut> = items.into_iter().map(task).collect();
    stream::iter(tasks)
        .buffered(concurrency.max(1))
        .collect()
        .await
}
