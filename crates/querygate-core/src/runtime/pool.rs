// crates/querygate-core/src/runtime/pool.rs
// ============================================================================
// Module: QueryGate Background Pool
// Description: Bounded worker pool for background statement execution.
// Purpose: Admit work with a bounded wait and run it on blocking threads.
// Dependencies: tokio, tracing, thiserror
// ============================================================================

//! ## Overview
//! The pool has `workers` running slots and `queue_capacity` waiting slots.
//! Admission takes one of `workers + queue_capacity` permits, waiting at most
//! `submit_wait` before failing with [`PoolError::Saturated`]. Admitted tasks
//! then wait for a worker slot and run on tokio's blocking thread pool.
//! Submission never waits on statement execution itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::sync::TryAcquireError;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default number of running slots.
pub const DEFAULT_POOL_WORKERS: usize = 100;
/// Default number of waiting slots.
pub const DEFAULT_POOL_QUEUE_CAPACITY: usize = 100;
/// Default bounded admission wait.
pub const DEFAULT_POOL_SUBMIT_WAIT: Duration = Duration::from_millis(50);

/// Background pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Concurrently running tasks.
    pub workers: usize,
    /// Admitted tasks allowed to wait for a worker.
    pub queue_capacity: usize,
    /// Maximum wait for admission before rejecting.
    pub submit_wait: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_POOL_WORKERS,
            queue_capacity: DEFAULT_POOL_QUEUE_CAPACITY,
            submit_wait: DEFAULT_POOL_SUBMIT_WAIT,
        }
    }
}

/// Background pool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// No admission slot became free within the submit wait.
    #[error("background pool saturated")]
    Saturated,
    /// Pool was shut down.
    #[error("background pool closed")]
    Closed,
}

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Handle to an admitted background task.
#[derive(Debug)]
pub struct BackgroundTask {
    /// Driver task that waits for a worker slot and starts the body.
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    /// Aborts the task if it has not started; a running body is left to its
    /// cancellation flag and keeps its permits until it returns.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Shared bounded background pool.
///
/// # Invariants
/// - At most `workers` tasks run at once.
/// - At most `workers + queue_capacity` tasks are admitted at once.
#[derive(Debug)]
pub struct BackgroundPool {
    /// Pool sizing.
    config: PoolConfig,
    /// Admission permits (running plus waiting).
    admission: Arc<Semaphore>,
    /// Running permits.
    workers: Arc<Semaphore>,
}

impl BackgroundPool {
    /// Creates a pool with the given sizing.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let admitted = config.workers.saturating_add(config.queue_capacity);
        Self {
            config,
            admission: Arc::new(Semaphore::new(admitted.min(Semaphore::MAX_PERMITS))),
            workers: Arc::new(Semaphore::new(config.workers.min(Semaphore::MAX_PERMITS))),
        }
    }

    /// Returns the pool sizing.
    #[must_use]
    pub const fn config(&self) -> PoolConfig {
        self.config
    }

    /// Returns the number of free admission slots.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.admission.available_permits()
    }

    /// Admits `task` and schedules it on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Saturated`] when no admission slot frees up within
    /// the submit wait, or [`PoolError::Closed`] after [`Self::close`].
    pub async fn submit<F>(&self, task: F) -> Result<BackgroundTask, PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let admission = match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
            Err(TryAcquireError::NoPermits) => {
                let waiting = Arc::clone(&self.admission).acquire_owned();
                match tokio::time::timeout(self.config.submit_wait, waiting).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => return Err(PoolError::Closed),
                    Err(_) => {
                        warn!(
                            workers = self.config.workers,
                            queue_capacity = self.config.queue_capacity,
                            "background pool saturated"
                        );
                        return Err(PoolError::Saturated);
                    }
                }
            }
        };
        let workers = Arc::clone(&self.workers);
        let handle = tokio::spawn(async move {
            let Ok(slot) = workers.acquire_owned().await else {
                debug!("background pool closed before task start");
                return;
            };
            // Permits live with the body: aborting the driver cannot free them early.
            let body = move || {
                let _admission = admission;
                let _slot = slot;
                task();
            };
            if let Err(err) = tokio::task::spawn_blocking(body).await
                && err.is_panic()
            {
                warn!("background task panicked");
            }
        });
        Ok(BackgroundTask {
            handle,
        })
    }

    /// Stops admitting work. Tasks waiting for a worker are dropped.
    pub fn close(&self) {
        self.admission.close();
        self.workers.close();
    }
}
