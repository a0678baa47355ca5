//! Aggregate report for a whole run
//!
//! Counters only ever grow: every page adds exactly one test.

use anyhow::Result;
use serde::Serialize;

use super::junit::{SuiteCounters, TestCaseRecord, TestSuiteDocument};
use super::xml::XmlElement;
use crate::error::RunnerError;

/// Merged results of every page that ran
#[derive(Clone, Debug, Default)]
pub struct AggregateReport {
    pub name: String,
    pub counters: SuiteCounters,
    pub testcases: Vec<TestCaseRecord>,
}

impl AggregateReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Merge the result of a page that ran to completion.
    ///
    /// The page counts as a single test whatever the remote reports as its
    /// own test count. The report is left untouched when the page's testcase
    /// record is missing from `document`.
    pub fn append_success(
        &mut self,
        page_name: &str,
        mut document: TestSuiteDocument,
    ) -> Result<(), RunnerError> {
        let record = document.take_testcase(page_name).ok_or_else(|| {
            RunnerError::malformed(format!(
                "no testcase named '{}' in result suite '{}'",
                page_name,
                document.name.as_deref().unwrap_or_default()
            ))
        })?;

        let remote = document.counters;
        self.counters.tests += 1;
        self.counters.failures += remote.failures;
        self.counters.disabled += remote.disabled;
        self.counters.errors += remote.errors;
        self.counters.time += remote.time;
        self.testcases.push(record);

        Ok(())
    }

    /// Record a page that could not be run
    pub fn append_failure(&mut self, name: &str, message: &str) {
        self.counters.tests += 1;
        self.counters.errors += 1;
        self.testcases.push(TestCaseRecord::synthetic_failure(name, message));
    }

    pub fn failed_testcases(&self) -> impl Iterator<Item = &TestCaseRecord> {
        self.testcases.iter().filter(|tc| tc.is_failed())
    }

    pub fn is_all_passed(&self) -> bool {
        self.counters.failures == 0 && self.counters.errors == 0
    }

    pub fn to_element(&self) -> XmlElement {
        let mut root = XmlElement::new("testsuite")
            .with_attribute("name", self.name.as_str())
            .with_attribute("tests", self.counters.tests.to_string())
            .with_attribute("failures", self.counters.failures.to_string())
            .with_attribute("disabled", self.counters.disabled.to_string())
            .with_attribute("errors", self.counters.errors.to_string())
            .with_attribute("time", self.counters.time.to_string());

        for testcase in &self.testcases {
            root = root.with_child(testcase.element().clone());
        }

        root
    }

    /// Serialize as a JUnit XML document
    pub fn to_xml(&self) -> Result<String> {
        self.to_element().to_document()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            name: self.name.clone(),
            counters: self.counters,
            failed: self
                .failed_testcases()
                .map(|tc| FailedTestCase {
                    name: tc.name().to_string(),
                    message: tc.failure_message().unwrap_or_default().to_string(),
                })
                .collect(),
        }
    }
}

/// Serializable view of a report for JSON output
#[derive(Clone, Debug, Serialize)]
pub struct ReportSummary {
    pub name: String,
    pub counters: SuiteCounters,
    pub failed: Vec<FailedTestCase>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FailedTestCase {
    pub name: String,
    pub message: String,
}
