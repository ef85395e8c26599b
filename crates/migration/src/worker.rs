//! Bounded fan-out shared by the dump and import engines.
//!
//! Work is submitted one station at a time. Every task holds a semaphore
//! permit for its whole lifetime, and the batch is awaited in full before the
//! caller moves to the next station. A panicking task is reported and counted
//! but never takes the batch down with it.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::error;

use crate::error::{MigrationError, Result};
use crate::notify::{join_error_message, CrashNotifier};

/// Result of one batch: task outputs in submission order, `None` for panics.
pub type BatchResults<T> = Vec<Option<T>>;

/// Spawn `tasks` under `semaphore` and wait for all of them.
pub async fn run_batch<T, Fut>(
    semaphore: &Arc<Semaphore>,
    tasks: Vec<(String, Fut)>,
    notifier: &Arc<dyn CrashNotifier>,
) -> Result<BatchResults<T>>
where
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let mut handles = Vec::with_capacity(tasks.len());

    for (name, task) in tasks {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| MigrationError::Task(e.to_string()))?;

        let handle = tokio::spawn(async move {
            let result = task.await;
            drop(permit);
            result
        });
        handles.push((name, handle));
    }

    let (names, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
    let joined = join_all(handles).await;

    let mut results = Vec::with_capacity(joined.len());
    for (name, outcome) in names.into_iter().zip(joined) {
        match outcome {
            Ok(result) => results.push(Some(result)),
            Err(e) => {
                let message = join_error_message(e);
                error!(series = %name, error = %message, "Worker panicked");
                notifier.notify(&format!("Migration worker panicked: {}", name), &message);
                results.push(None);
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_batch_survives_panics() {
        let semaphore = Arc::new(Semaphore::new(2));
        let notifier: Arc<dyn CrashNotifier> = Arc::new(LogNotifier::default());

        let tasks: Vec<(String, _)> = (0..4)
            .map(|i| {
                let name = format!("task {}", i);
                let fut = async move {
                    if i == 2 {
                        panic!("task {} failed", i);
                    }
                    i * 10
                };
                (name, fut)
            })
            .collect();

        let results = run_batch(&semaphore, tasks, &notifier).await.unwrap();
        assert_eq!(results, vec![Some(0), Some(10), None, Some(30)]);
        assert_eq!(semaphore.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let semaphore = Arc::new(Semaphore::new(2));
        let notifier: Arc<dyn CrashNotifier> = Arc::new(LogNotifier::default());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<(String, _)> = (0..8)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                let fut = async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                };
                (format!("task {}", i), fut)
            })
            .collect();

        run_batch(&semaphore, tasks, &notifier).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
