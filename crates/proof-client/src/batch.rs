//! Bounded-concurrency batch execution
//!
//! The driver behind the per-wallet fallback tier and ENS resolution: runs
//! independent async jobs over an item list with a fixed in-flight cap,
//! records every result at the item's original index, and reports monotone
//! progress. Cooperative cancellation stops new starts, lets in-flight work
//! settle, and rejects the whole batch with [`ClientError::Cancelled`].

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};

/// Progress callback: receives the completed-item count after every settle.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(usize) + Send);

/// Race a fallible future against a cancellation token.
pub(crate) async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        out = fut => out,
    }
}

/// Run `worker` over `items` with at most `concurrency` jobs in flight.
///
/// Output order always equals input order regardless of completion order.
/// A worker failing with anything but cancellation is converted per item via
/// `recover`; a cancellation-class failure (or the token firing) aborts the
/// batch after in-flight workers settle.
pub async fn run_batch<T, R, F, Fut, Rec>(
    items: Vec<T>,
    concurrency: usize,
    cancel: &CancellationToken,
    worker: F,
    recover: Rec,
    mut on_progress: Option<ProgressFn<'_>>,
) -> Result<Vec<R>>
where
    T: Clone,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = Result<R>>,
    Rec: Fn(&T, ClientError) -> R,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    if cancel.is_cancelled() {
        return Err(ClientError::Cancelled);
    }

    let concurrency = concurrency.max(1);
    let total = items.len();
    let mut slots: Vec<Option<R>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    let mut in_flight = FuturesUnordered::new();
    let mut next_index = 0usize;
    let mut completed = 0usize;
    let mut cancelled = false;

    // Single construction site so every in-flight future has the same type.
    let start = |index: usize| {
        let fut = worker(items[index].clone(), index);
        async move { (index, fut.await) }
    };

    while next_index < total && in_flight.len() < concurrency {
        in_flight.push(start(next_index));
        next_index += 1;
    }

    while let Some((index, outcome)) = in_flight.next().await {
        match outcome {
            Ok(result) => slots[index] = Some(result),
            Err(err) if err.is_cancelled() => {
                cancelled = true;
                slots[index] = Some(recover(&items[index], ClientError::Cancelled));
            }
            Err(err) => slots[index] = Some(recover(&items[index], err)),
        }

        completed += 1;
        if let Some(progress) = on_progress.as_mut() {
            progress(completed);
        }

        if cancel.is_cancelled() {
            cancelled = true;
        }

        while !cancelled && next_index < total && in_flight.len() < concurrency {
            in_flight.push(start(next_index));
            next_index += 1;
        }
    }

    if cancelled || cancel.is_cancelled() {
        return Err(ClientError::Cancelled);
    }

    // Every scheduled slot settled exactly once above.
    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("settled batch slot"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn no_recover(_item: &usize, err: ClientError) -> String {
        format!("error: {err}")
    }

    #[tokio::test]
    async fn output_order_matches_input_order() {
        let cancel = CancellationToken::new();
        let items: Vec<usize> = (0..8).collect();

        let results = run_batch(
            items,
            4,
            &cancel,
            |item, index| async move {
                // Later items finish first.
                tokio::time::sleep(Duration::from_millis(20 - 2 * index as u64)).await;
                Ok(format!("item-{item}"))
            },
            no_recover,
            None,
        )
        .await
        .unwrap();

        let expected: Vec<String> = (0..8).map(|i| format!("item-{i}")).collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn progress_is_monotone_and_complete() {
        let cancel = CancellationToken::new();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let counts_sink = Arc::clone(&counts);
        let mut on_progress = move |done: usize| counts_sink.lock().unwrap().push(done);

        run_batch(
            (0..6).collect::<Vec<usize>>(),
            2,
            &cancel,
            |item, _| async move { Ok(item) },
            |item, _| *item,
            Some(&mut on_progress),
        )
        .await
        .unwrap();

        let counts = counts.lock().unwrap();
        assert_eq!(*counts, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_the_cap() {
        let cancel = CancellationToken::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        run_batch(
            (0..12).collect::<Vec<usize>>(),
            3,
            &cancel,
            |item, _| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(item)
                }
            },
            |item, _| *item,
            None,
        )
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn worker_failures_are_recovered_per_item() {
        let cancel = CancellationToken::new();

        let results = run_batch(
            (0..4).collect::<Vec<usize>>(),
            2,
            &cancel,
            |item, _| async move {
                if item == 2 {
                    Err(ClientError::Http("connection reset".to_string()))
                } else {
                    Ok(format!("ok-{item}"))
                }
            },
            |item, err| format!("failed-{item}: {err}"),
            None,
        )
        .await
        .unwrap();

        assert_eq!(results[0], "ok-0");
        assert_eq!(results[1], "ok-1");
        assert!(results[2].starts_with("failed-2"));
        assert_eq!(results[3], "ok-3");
    }

    #[tokio::test]
    async fn cancellation_stops_new_starts_and_rejects() {
        let cancel = CancellationToken::new();
        let started = Arc::new(AtomicUsize::new(0));

        let outcome = run_batch(
            (0..10).collect::<Vec<usize>>(),
            1,
            &cancel,
            |item, _| {
                let started = Arc::clone(&started);
                let cancel = cancel.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    if item == 0 {
                        cancel.cancel();
                    }
                    Ok(item)
                }
            },
            |item, _| *item,
            None,
        )
        .await;

        assert!(matches!(outcome, Err(ClientError::Cancelled)));
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_input_resolves_without_progress() {
        let cancel = CancellationToken::new();
        let mut fired = false;
        let mut on_progress = |_: usize| fired = true;

        let results = run_batch(
            Vec::<usize>::new(),
            4,
            &cancel,
            |item, _| async move { Ok(item) },
            |item, _| *item,
            Some(&mut on_progress),
        )
        .await
        .unwrap();

        assert!(results.is_empty());
        assert!(!fired);
    }

    #[tokio::test]
    async fn already_cancelled_token_rejects_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run_batch(
            vec![1usize],
            1,
            &cancel,
            |item, _| async move { Ok(item) },
            |item, _| *item,
            None,
        )
        .await;

        assert!(matches!(outcome, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn with_cancel_maps_the_token_to_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = with_cancel(&cancel, async { Ok::<_, ClientError>(1) }).await;
        assert!(matches!(outcome, Err(ClientError::Cancelled)));
    }
}
