//! Page runner
//!
//! Runs one page on one executor: checks its properties, executes it, reruns
//! it while its result reports failures, then hands the outcome to the
//! aggregator. Errors never leave `run_page`; they become failure records.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::RunnerConfig;
use crate::http::WikiClient;
use crate::models::{Executor, Page, SkipReason, TestOutcome};
use crate::results::{AggregatorHandle, TestSuiteDocument};
use crate::retry::{with_retry, RetryOptions};

/// Runs pages against a [`WikiClient`]
pub struct PageRunner {
    client: Arc<dyn WikiClient>,
    test_retry: RetryOptions,
    failed_test_retries: u32,
    failed_test_cooldown: Duration,
}

impl PageRunner {
    pub fn new(client: Arc<dyn WikiClient>) -> Self {
        Self {
            client,
            test_retry: RetryOptions::test_execution(),
            failed_test_retries: 3,
            failed_test_cooldown: Duration::from_secs(5),
        }
    }

    pub fn from_config(client: Arc<dyn WikiClient>, config: &RunnerConfig) -> Self {
        Self::new(client)
            .with_test_retry(config.test_retry.clone())
            .with_failed_test_retries(
                config.failed_test_retries,
                config.failed_test_retry_timeout(),
            )
    }

    pub fn with_test_retry(mut self, options: RetryOptions) -> Self {
        self.test_retry = options;
        self
    }

    /// Rerun a failing page up to `retries` times, pausing `cooldown` before each
    pub fn with_failed_test_retries(mut self, retries: u32, cooldown: Duration) -> Self {
        self.failed_test_retries = retries;
        self.failed_test_cooldown = cooldown;
        self
    }

    /// Run `page` on `executor` and record the outcome.
    ///
    /// Skipped pages append nothing; every other page appends exactly one
    /// record, a failure record when the page could not be run.
    pub async fn run_page(
        &self,
        executor: &Executor,
        page: &Page,
        aggregator: &AggregatorHandle,
    ) -> TestOutcome {
        match self.execute(executor, page, aggregator).await {
            Ok(outcome) => outcome,
            Err(err) => record_failure(executor, page, aggregator, format!("{err:#}")),
        }
    }

    /// Like [`run_page`](Self::run_page), on its own task so that a panic in
    /// the client or the parser still leaves a failure record for the page.
    pub async fn run_isolated(
        self: Arc<Self>,
        executor: Executor,
        page: Page,
        aggregator: AggregatorHandle,
    ) -> TestOutcome {
        let job = tokio::spawn({
            let (executor, page, aggregator) = (executor.clone(), page.clone(), aggregator.clone());
            async move { self.run_page(&executor, &page, &aggregator).await }
        });

        match job.await {
            Ok(outcome) => outcome,
            Err(err) => record_failure(
                &executor,
                &page,
                &aggregator,
                format!("page run panicked: {err}"),
            ),
        }
    }

    async fn execute(
        &self,
        executor: &Executor,
        page: &Page,
        aggregator: &AggregatorHandle,
    ) -> Result<TestOutcome> {
        info!(page = %page, executor = %executor, "Querying page properties");
        let properties = with_retry(&format!("{page} properties"), &self.test_retry, || {
            self.client.page_properties(executor, page)
        })
        .await?;

        if !properties.test {
            info!(page = %page, "Not a test, skipping");
            return Ok(TestOutcome::Skipped(SkipReason::NotATest));
        }
        if properties.prune {
            info!(page = %page, "Pruned, skipping");
            return Ok(TestOutcome::Skipped(SkipReason::Pruned));
        }

        let mut attempts = 0;
        let document = loop {
            attempts += 1;
            info!(page = %page, executor = %executor, attempt = attempts, "Executing");

            let xml = with_retry(&format!("{page} run"), &self.test_retry, || {
                self.client.run_test(executor, page)
            })
            .await?;
            let document = TestSuiteDocument::parse(&xml)?;
            info!(page = %page, "Result: {}", document.counters);

            if !document.counters.has_failures() {
                break document;
            }
            if attempts > self.failed_test_retries {
                warn!(
                    page = %page,
                    "Still failing after {} attempts, keeping the last result", attempts
                );
                break document;
            }

            warn!(
                page = %page,
                "Test failed, rerunning in {:?} ({}/{})",
                self.failed_test_cooldown,
                attempts,
                self.failed_test_retries
            );
            sleep(self.failed_test_cooldown).await;
        };

        aggregator
            .append_success(page.name(), document.clone())
            .await?;

        Ok(TestOutcome::Completed { document, attempts })
    }
}

fn record_failure(
    executor: &Executor,
    page: &Page,
    aggregator: &AggregatorHandle,
    message: String,
) -> TestOutcome {
    error!(page = %page, executor = %executor, "Page failed: {}", message);

    if let Err(e) = aggregator.append_failure(page.name(), &message) {
        error!(page = %page, "Could not record failure: {}", e);
    }

    TestOutcome::Failed {
        name: page.name().to_string(),
        message,
    }
}
