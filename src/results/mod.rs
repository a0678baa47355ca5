//! Results module
//!
//! JUnit parsing, the run-wide aggregate report and its persistence.

mod aggregator;
mod junit;
mod report;
mod storage;
mod xml;

pub use aggregator::{AggregatorHandle, ResultAggregator};
pub use junit::TestSuiteDocument;
pub use report::AggregateReport;
pub use storage::{BlobStorage, BlobTarget, ReportTargets};

#[cfg(test)]
pub(crate) use junit::fixtures;
