//! Bounded worker pool for upstream fetch tasks.
//!
//! A thin wrapper over a counting semaphore: `spawn` waits for a free slot,
//! then runs the future as a tokio task that holds the permit until it
//! finishes. The pool is constructed explicitly and passed into the
//! orchestrator so tests can pick their own capacity. No priority,
//! cancellation, or timeout.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    /// A pool running at most `capacity` tasks at once (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Submit a task, waiting until a slot is free. The returned handle
    /// lets callers fan out a batch and drain results afterwards.
    pub async fn spawn<F, T>(&self, task: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore closed");

        tokio::spawn(async move {
            let _permit = permit;
            task.await
        })
    }
}
