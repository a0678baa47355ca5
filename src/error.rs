//! Runner error taxonomy
//!
//! Errors that decide whether a run continues or stops. Transport errors live
//! in the HTTP client error type; everything fatal for a run ends up here.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Where the scheduler was waiting when the pool starved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitPhase {
    /// Waiting for an executor to dispatch the next task
    Acquire,
    /// Waiting for every executor to come back after dispatching all tasks
    Drain,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitPhase::Acquire => write!(f, "acquiring an executor"),
            WaitPhase::Drain => write!(f, "draining the executor pool"),
        }
    }
}

/// Runner errors
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Executor pool starved while {phase} ({}s timeout), busy executors: [{}]",
        timeout.as_secs(),
        busy.join(", ")
    )]
    PoolStarvation {
        phase: WaitPhase,
        timeout: Duration,
        busy: Vec<String>,
    },

    #[error("Malformed upstream data: {0}")]
    MalformedUpstreamData(String),

    #[error("Execution error: {0}")]
    Execution(String),
}

impl RunnerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        RunnerError::Configuration(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        RunnerError::MalformedUpstreamData(message.into())
    }

    /// Whether this error stops the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RunnerError::Configuration(_) | RunnerError::PoolStarvation { .. }
        )
    }
}
