//! Chunked fan-out/fan-in over a bounded worker pool.
//!
//! Items are split into chunks of `batch_size`. Within a chunk every item is
//! spawned as its own task but at most `workers` run at once; the chunk is
//! awaited in full before the next one starts, so no more than
//! `min(batch_size, workers)` calls are ever in flight. Results keep input
//! order regardless of completion order.
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMapper {
    batch_size: NonZeroUsize,
    workers: NonZeroUsize,
}

impl BatchMapper {
    #[must_use]
    pub const fn new(batch_size: NonZeroUsize, workers: NonZeroUsize) -> Self {
        Self {
            batch_size,
            workers,
        }
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers.get()
    }

    #[must_use]
    pub fn chunks<'a, T>(&self, items: &'a [T]) -> std::slice::Chunks<'a, T> {
        items.chunks(self.batch_size.get())
    }

    /// Maps one chunk concurrently. A task that panics yields `fallback()` in
    /// its slot.
    pub async fn map_chunk<T, R, F, Fut, G>(&self, chunk: &[T], task: F, fallback: &G) -> Vec<R>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        G: Fn() -> R,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers.get()));
        let mut handles = Vec::with_capacity(chunk.len());

        for item in chunk.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let task = task.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                task(item).await
            }));
        }

        join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(slot, joined)| match joined {
                Ok(value) => value,
                Err(join_error) => {
                    warn!(slot, error = %join_error, "batch task aborted, using fallback");
                    fallback()
                }
            })
            .collect()
    }

    /// Maps every item, chunk after chunk.
    pub async fn map_all<T, R, F, Fut, G>(&self, items: &[T], task: F, fallback: &G) -> Vec<R>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        G: Fn() -> R,
    {
        let mut results = Vec::with_capacity(items.len());
        for chunk in self.chunks(items) {
            let mapped = self.map_chunk(chunk, task.clone(), fallback).await;
            results.extend(mapped);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn mapper(batch: usize, workers: usize) -> BatchMapper {
        BatchMapper::new(
            NonZeroUsize::new(batch).unwrap(),
            NonZeroUsize::new(workers).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn output_order_matches_input_despite_completion_order() {
        let items: Vec<u64> = (0..10).collect();

        let results = mapper(4, 4)
            .map_all(
                &items,
                |n: u64| async move {
                    // later items finish first
                    tokio::time::sleep(Duration::from_millis(100 - n * 10)).await;
                    n * 2
                },
                &|| u64::MAX,
            )
            .await;

        assert_eq!(results, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_calls_never_exceed_workers() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..25).collect();

        let task = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            move |n: usize| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    n
                }
            }
        };

        let results = mapper(10, 3).map_all(&items, task, &|| 0).await;

        assert_eq!(results.len(), 25);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_do_not_overlap() {
        let finished = Arc::new(AtomicUsize::new(0));
        let violations = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..9).collect();

        let task = {
            let finished = Arc::clone(&finished);
            let violations = Arc::clone(&violations);
            move |n: usize| {
                let finished = Arc::clone(&finished);
                let violations = Arc::clone(&violations);
                async move {
                    let chunk_start = (n / 3) * 3;
                    if finished.load(Ordering::SeqCst) < chunk_start {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(10 * (3 - n as u64 % 3))).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    n
                }
            }
        };

        mapper(3, 8).map_all(&items, task, &|| 0).await;

        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert_eq!(finished.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn panicking_task_gets_fallback_in_place() {
        let items = vec![1_i32, 2, 3];

        let results = mapper(3, 2)
            .map_chunk(
                &items,
                |n: i32| async move {
                    assert!(n != 2, "boom");
                    n * 10
                },
                &|| -1,
            )
            .await;

        assert_eq!(results, vec![10, -1, 30]);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let results: Vec<i32> = mapper(5, 5)
            .map_all(&Vec::<i32>::new(), |n: i32| async move { n }, &|| 0)
            .await;
        assert!(results.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(48))]

            #[test]
            fn map_all_keeps_length_and_order(
                items in prop::collection::vec(any::<u32>(), 0..60),
                batch in 1_usize..12,
                workers in 1_usize..6,
            ) {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .build()
                    .expect("runtime builds");

                let results = runtime.block_on(mapper(batch, workers).map_all(
                    &items,
                    |n: u32| async move {
                        // uneven yields so tasks finish out of order
                        for _ in 0..(n % 7) {
                            tokio::task::yield_now().await;
                        }
                        u64::from(n) + 1
                    },
                    &|| 0,
                ));

                let expected: Vec<u64> = items.iter().map(|&n| u64::from(n) + 1).collect();
                prop_assert_eq!(results, expected);
            }
        }
    }
}
