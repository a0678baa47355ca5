//! Suite runner
//!
//! Lists the pages of a suite, runs them on the executor pool and returns the
//! merged report.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::pool::ExecutorPool;
use super::runner::PageRunner;
use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::http::WikiClient;
use crate::models::{pages_from_listing, Executor, Page, TestOutcome};
use crate::results::{AggregateReport, ResultAggregator};
use crate::retry::{with_retry, RetryOptions};
use crate::utils::Timer;

/// Counts of page outcomes in one run
#[derive(Debug, Default)]
struct OutcomeTally {
    completed: AtomicUsize,
    still_failing: AtomicUsize,
    reruns: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl OutcomeTally {
    fn record(&self, outcome: &TestOutcome) {
        match outcome {
            TestOutcome::Skipped(_) => {
                self.skipped.fetch_add(1, Ordering::SeqCst);
            }
            TestOutcome::Completed { document, attempts } => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                self.reruns
                    .fetch_add(attempts.saturating_sub(1) as usize, Ordering::SeqCst);
                if document.counters.has_failures() {
                    self.still_failing.fetch_add(1, Ordering::SeqCst);
                }
            }
            TestOutcome::Failed { .. } => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

/// Result of a whole suite run
#[derive(Debug)]
pub struct SuiteRun {
    pub report: AggregateReport,
    pub pages: usize,
    /// Pages that ran to a result, passing or not
    pub completed: usize,
    /// Completed pages whose final result still reports failures
    pub still_failing: usize,
    /// Reruns of failing pages across the run
    pub reruns: usize,
    pub skipped: usize,
    /// Pages that could not be run at all
    pub failed: usize,
    pub elapsed: Duration,
}

/// Runs a whole suite across a pool of executors
pub struct SuiteRunner {
    client: Arc<dyn WikiClient>,
    pages: Arc<PageRunner>,
    discovery_retry: RetryOptions,
    pool_wait_timeout: Duration,
}

impl SuiteRunner {
    pub fn new(client: Arc<dyn WikiClient>) -> Self {
        Self {
            pages: Arc::new(PageRunner::new(Arc::clone(&client))),
            client,
            discovery_retry: RetryOptions::discovery(),
            pool_wait_timeout: super::pool::DEFAULT_WAIT_TIMEOUT,
        }
    }

    pub fn from_config(client: Arc<dyn WikiClient>, config: &RunnerConfig) -> Self {
        Self {
            pages: Arc::new(PageRunner::from_config(Arc::clone(&client), config)),
            client,
            discovery_retry: config.discovery_retry.clone(),
            pool_wait_timeout: config.pool_wait_timeout(),
        }
    }

    pub fn with_page_runner(mut self, runner: PageRunner) -> Self {
        self.pages = Arc::new(runner);
        self
    }

    pub fn with_discovery_retry(mut self, options: RetryOptions) -> Self {
        self.discovery_retry = options;
        self
    }

    pub fn with_pool_wait_timeout(mut self, timeout: Duration) -> Self {
        self.pool_wait_timeout = timeout;
        self
    }

    /// List the leaf pages of `suite` using the first executor
    pub async fn discover(
        &self,
        executors: &[Executor],
        suite: &str,
    ) -> Result<Vec<Page>, RunnerError> {
        let executor = executors
            .first()
            .ok_or_else(|| RunnerError::configuration("no executors to list the suite with"))?;

        info!(suite = %suite, executor = %executor, "Listing suite pages");
        let listing = with_retry(
            &format!("{suite} listing"),
            &self.discovery_retry,
            || self.client.list_pages(executor, suite),
        )
        .await
        .map_err(|e| RunnerError::Execution(format!("listing suite {suite} failed: {e:#}")))?;

        let pages = pages_from_listing(suite, &listing);
        if pages.is_empty() {
            warn!(suite = %suite, "Suite has no pages");
        } else {
            info!(suite = %suite, "Found {} pages", pages.len());
        }
        Ok(pages)
    }

    /// Run every page of `suite` and return the merged report.
    ///
    /// Page failures end up in the report; only configuration errors, a
    /// failed listing and pool starvation fail the run.
    pub async fn run(
        &self,
        executors: Vec<Executor>,
        suite: &str,
    ) -> Result<SuiteRun, RunnerError> {
        let timer = Timer::start(format!("suite {suite}"));
        let pool =
            ExecutorPool::new(executors.clone())?.with_wait_timeout(self.pool_wait_timeout);

        let pages = self.discover(&executors, suite).await?;
        let page_count = pages.len();

        let aggregator = ResultAggregator::spawn(suite);
        let tally = Arc::new(OutcomeTally::default());

        let pool_run = pool.run(pages, {
            let runner = Arc::clone(&self.pages);
            let handle = aggregator.handle();
            let tally = Arc::clone(&tally);
            move |executor, page, _index| {
                let runner = Arc::clone(&runner);
                let handle = handle.clone();
                let tally = Arc::clone(&tally);
                async move {
                    let outcome = runner.run_isolated(executor, page, handle).await;
                    tally.record(&outcome);
                }
            }
        })
        .await?;
        debug!(
            "Dispatched {} pages on {} executors in {:?}",
            pool_run.dispatched, pool_run.executors, pool_run.elapsed
        );

        let report = aggregator
            .finish()
            .await
            .map_err(|e| RunnerError::Execution(format!("{e:#}")))?;

        let run = SuiteRun {
            report,
            pages: page_count,
            completed: tally.completed.load(Ordering::SeqCst),
            still_failing: tally.still_failing.load(Ordering::SeqCst),
            reruns: tally.reruns.load(Ordering::SeqCst),
            skipped: tally.skipped.load(Ordering::SeqCst),
            failed: tally.failed.load(Ordering::SeqCst),
            elapsed: timer.stop(),
        };

        info!(
            suite = %suite,
            "Ran {} pages in {:.1}s: {} completed ({} still failing, {} reruns), {} skipped, {} not run",
            run.pages,
            run.elapsed.as_secs_f64(),
            run.completed,
            run.still_failing,
            run.reruns,
            run.skipped,
            run.failed
        );
        Ok(run)
    }
}
