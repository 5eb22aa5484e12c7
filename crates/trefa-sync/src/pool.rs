//! Bounded worker pool for attachment tasks.
//!
//! One [`ConcurrencyPool`] is shared by every record of a run, so the bound holds
//! across records. Each record schedules its tasks on its own [`TaskGroup`] and drains
//! only that group.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Semaphore-backed admission control with in-flight gauges.
#[derive(Clone)]
pub struct ConcurrencyPool {
    semaphore: Arc<Semaphore>,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyPool {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of tasks ever running at once on this pool.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn group<T: Send + 'static>(&self) -> TaskGroup<T> {
        TaskGroup {
            pool: self.clone(),
            tasks: JoinSet::new(),
            scheduled: 0,
        }
    }
}

/// Decrements the in-flight gauge when a task finishes, panics or is aborted.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl InFlightGuard {
    fn enter(pool: &ConcurrencyPool) -> Self {
        let now = pool.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        pool.peak.fetch_max(now, Ordering::SeqCst);
        Self {
            in_flight: pool.in_flight.clone(),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A task that panicked instead of producing an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPanic {
    pub message: String,
}

impl TaskPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };
        Self { message }
    }
}

/// Tasks scheduled for one record. Dropping an undrained group aborts its tasks.
pub struct TaskGroup<T> {
    pool: ConcurrencyPool,
    tasks: JoinSet<(usize, Result<T, TaskPanic>)>,
    scheduled: usize,
}

impl<T: Send + 'static> TaskGroup<T> {
    /// Start `task` once a pool slot is free and return its submission index.
    ///
    /// Suspends while the pool is at its limit. Waiters are admitted in FIFO order.
    pub async fn schedule<F>(&mut self, task: F) -> usize
    where
        F: Future<Output = T> + Send + 'static,
    {
        // The semaphore is never closed, so acquisition only fails if that changes.
        let permit = self.pool.semaphore.clone().acquire_owned().await.ok();
        let guard = InFlightGuard::enter(&self.pool);

        let index = self.scheduled;
        self.scheduled += 1;

        self.tasks.spawn(async move {
            let _permit = permit;
            let _guard = guard;
            let outcome = AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .map_err(TaskPanic::from_payload);
            (index, outcome)
        });

        index
    }

    pub fn len(&self) -> usize {
        self.scheduled
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled == 0
    }

    /// Wait for every scheduled task and return the outcomes in submission order.
    pub async fn drain(mut self) -> Vec<Result<T, TaskPanic>> {
        let mut slots: Vec<Option<Result<T, TaskPanic>>> =
            (0..self.scheduled).map(|_| None).collect();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => {
                    // Only reachable if the runtime cancels the task underneath us.
                    tracing::error!(error = %e, "Attachment task did not complete");
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(TaskPanic {
                        message: "task cancelled".to_string(),
                    })
                })
            })
            .collect()
    }
}
