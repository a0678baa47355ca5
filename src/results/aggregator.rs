//! Single-owner aggregator
//!
//! The report lives inside one task; pages send their outcomes to it over a
//! channel, so concurrent pages never touch the report directly.

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::junit::TestSuiteDocument;
use super::report::AggregateReport;
use crate::error::RunnerError;

enum AggregateMessage {
    Success {
        page: String,
        document: TestSuiteDocument,
        reply: oneshot::Sender<Result<(), RunnerError>>,
    },
    Failure {
        name: String,
        message: String,
    },
}

/// Owner of the aggregate report for one run
pub struct ResultAggregator {
    handle: AggregatorHandle,
    task: JoinHandle<AggregateReport>,
}

impl ResultAggregator {
    /// Start the aggregator task for a report called `name`
    pub fn spawn(name: impl Into<String>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut report = AggregateReport::new(name);

        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    AggregateMessage::Success {
                        page,
                        document,
                        reply,
                    } => {
                        let result = report.append_success(&page, document);
                        debug!(page = %page, ok = result.is_ok(), "appended page result");
                        // The sender may have given up waiting; the append stands either way
                        let _ = reply.send(result);
                    }
                    AggregateMessage::Failure { name, message } => {
                        debug!(page = %name, "appended page failure");
                        report.append_failure(&name, &message);
                    }
                }
            }
            report
        });

        Self {
            handle: AggregatorHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> AggregatorHandle {
        self.handle.clone()
    }

    /// Wait for every handle to be dropped and return the final report
    pub async fn finish(self) -> Result<AggregateReport> {
        drop(self.handle);
        self.task.await.context("aggregator task failed")
    }
}

/// Cloneable sender side of the aggregator
#[derive(Clone)]
pub struct AggregatorHandle {
    tx: mpsc::UnboundedSender<AggregateMessage>,
}

impl AggregatorHandle {
    /// Merge a completed page result; fails when its testcase is missing
    pub async fn append_success(
        &self,
        page: &str,
        document: TestSuiteDocument,
    ) -> Result<(), RunnerError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(AggregateMessage::Success {
                page: page.to_string(),
                document,
                reply,
            })
            .map_err(|_| RunnerError::Execution("aggregator is closed".to_string()))?;

        response
            .await
            .map_err(|_| RunnerError::Execution("aggregator dropped the reply".to_string()))?
    }

    /// Record a page that could not be run
    pub fn append_failure(&self, name: &str, message: &str) -> Result<(), RunnerError> {
        self.tx
            .send(AggregateMessage::Failure {
                name: name.to_string(),
                message: message.to_string(),
            })
            .map_err(|_| RunnerError::Execution("aggregator is closed".to_string()))
    }
}
