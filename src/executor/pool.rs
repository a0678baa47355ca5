//! Executor pool scheduler
//!
//! Pairs each task with a free executor and runs it as its own tokio task.
//! A semaphore holds one permit per available executor: dispatch suspends on
//! it when every executor is busy, and the final drain takes all permits back.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{timeout, Instant};
use tracing::{debug, info};

use crate::error::{RunnerError, WaitPhase};
use crate::models::Executor;
use crate::utils::Timer;

/// Default time to wait for an executor, and for the final drain
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// A task currently holding an executor
#[derive(Clone, Debug)]
pub struct InFlight {
    pub task_index: usize,
    pub task: String,
    pub started: Instant,
}

#[derive(Default)]
struct PoolState {
    available: VecDeque<Executor>,
    busy: HashMap<Executor, InFlight>,
}

struct PoolShared {
    state: Mutex<PoolState>,
    permits: Arc<Semaphore>,
    total: usize,
}

/// Point-in-time view of the pool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub total: usize,
    pub available: usize,
    pub busy: usize,
}

/// Read-only view of a running pool
#[derive(Clone)]
pub struct PoolMonitor {
    shared: Arc<PoolShared>,
}

impl PoolMonitor {
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.shared.state.lock();
        PoolSnapshot {
            total: self.shared.total,
            available: state.available.len(),
            busy: state.busy.len(),
        }
    }

    /// Busy executors and the tasks they run
    pub fn in_flight(&self) -> Vec<(Executor, InFlight)> {
        let state = self.shared.state.lock();
        let mut busy: Vec<_> = state
            .busy
            .iter()
            .map(|(executor, task)| (executor.clone(), task.clone()))
            .collect();
        busy.sort_by_key(|(_, task)| task.task_index);
        busy
    }
}

/// Exclusive use of one executor; hands it back to the pool on drop
struct ExecutorLease {
    executor: Executor,
    shared: Arc<PoolShared>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for ExecutorLease {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.busy.remove(&self.executor);
        state.available.push_back(self.executor.clone());
        // the permit is released after this, once the executor is back
    }
}

/// Outcome of a completed pool run
#[derive(Clone, Debug)]
pub struct PoolRunSummary {
    pub dispatched: usize,
    pub executors: usize,
    pub elapsed: Duration,
}

/// Fixed pool of executors shared by all tasks of a run
pub struct ExecutorPool {
    shared: Arc<PoolShared>,
    wait_timeout: Duration,
}

impl ExecutorPool {
    pub fn new(executors: Vec<Executor>) -> Result<Self, RunnerError> {
        if executors.is_empty() {
            return Err(RunnerError::configuration("executor pool is empty"));
        }

        let total = executors.len();
        let state = PoolState {
            available: executors.into_iter().collect(),
            busy: HashMap::new(),
        };

        Ok(Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(state),
                permits: Arc::new(Semaphore::new(total)),
                total,
            }),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        })
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn monitor(&self) -> PoolMonitor {
        PoolMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run every task on some executor, at most one task per executor at a time.
    ///
    /// Tasks are dispatched in order without waiting for earlier ones to
    /// finish. Returns once all tasks are dispatched and every executor is back
    /// in the pool. A wait longer than the pool timeout aborts the run; tasks
    /// still running at that point are left to finish on their own.
    pub async fn run<T, W, Fut>(
        self,
        tasks: Vec<T>,
        mut worker: W,
    ) -> Result<PoolRunSummary, RunnerError>
    where
        T: Display + Send,
        W: FnMut(Executor, T, usize) -> Fut + Send,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let timer = Timer::start("executor pool run");
        let dispatched = tasks.len();

        info!(
            "Dispatching {} tasks on {} executors",
            dispatched, self.shared.total
        );

        for (index, task) in tasks.into_iter().enumerate() {
            let number = index + 1;
            info!("Task {}: starting", number);

            let lease = self.acquire(number, index, &task).await?;
            debug!("Task {}: {} on {}", number, task, lease.executor);

            let job = worker(lease.executor.clone(), task, index);
            tokio::spawn(async move {
                let _lease = lease;
                job.await;
                info!("Task {}: processed", number);
            });
        }

        self.drain().await?;

        Ok(PoolRunSummary {
            dispatched,
            executors: self.shared.total,
            elapsed: timer.stop(),
        })
    }

    async fn acquire<T: Display>(
        &self,
        number: usize,
        index: usize,
        task: &T,
    ) -> Result<ExecutorLease, RunnerError> {
        let permit = match Arc::clone(&self.shared.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                info!("Task {}: no executors, waiting ...", number);
                debug!("Task {}: pool {:?}", number, self.monitor().snapshot());
                let permit = timeout(
                    self.wait_timeout,
                    Arc::clone(&self.shared.permits).acquire_owned(),
                )
                .await
                .map_err(|_| self.starvation(WaitPhase::Acquire))?
                .map_err(|_| RunnerError::Execution("executor pool is closed".to_string()))?;
                info!("Task {}: executors available, continue", number);
                permit
            }
        };

        let executor = {
            let mut state = self.shared.state.lock();
            let executor = state.available.pop_front().ok_or_else(|| {
                RunnerError::Execution("executor permit granted with no executor free".to_string())
            })?;
            state.busy.insert(
                executor.clone(),
                InFlight {
                    task_index: index,
                    task: task.to_string(),
                    started: Instant::now(),
                },
            );
            executor
        };

        Ok(ExecutorLease {
            executor,
            shared: Arc::clone(&self.shared),
            _permit: permit,
        })
    }

    /// Wait until every executor is back
    async fn drain(&self) -> Result<(), RunnerError> {
        let total = self.shared.total as u32;
        let _all = timeout(self.wait_timeout, self.shared.permits.acquire_many(total))
            .await
            .map_err(|_| self.starvation(WaitPhase::Drain))?
            .map_err(|_| RunnerError::Execution("executor pool is closed".to_string()))?;

        debug!("All {} executors returned to the pool", total);
        Ok(())
    }

    fn starvation(&self, phase: WaitPhase) -> RunnerError {
        let busy = self
            .monitor()
            .in_flight()
            .into_iter()
            .map(|(executor, task)| {
                format!(
                    "{} ({}, running {}s)",
                    executor,
                    task.task,
                    task.started.elapsed().as_secs()
                )
            })
            .collect();

        RunnerError::PoolStarvation {
            phase,
            timeout: self.wait_timeout,
            busy,
        }
    }
}
