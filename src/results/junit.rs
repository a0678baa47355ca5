//! JUnit documents returned by `?suite&format=junit`

use serde::Serialize;
use std::fmt;

use super::xml::XmlElement;
use crate::error::RunnerError;

/// Counters carried on a `<testsuite>` element
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SuiteCounters {
    pub tests: u64,
    pub failures: u64,
    pub disabled: u64,
    pub errors: u64,
    pub time: f64,
}

impl SuiteCounters {
    /// A semantic test failure: the test ran but its assertions did not hold
    pub fn has_failures(&self) -> bool {
        self.failures > 0 || self.errors > 0
    }

    fn from_element(element: &XmlElement) -> Result<Self, RunnerError> {
        Ok(Self {
            tests: count_attribute(element, "tests")?,
            failures: count_attribute(element, "failures")?,
            disabled: count_attribute(element, "disabled")?,
            errors: count_attribute(element, "errors")?,
            time: time_attribute(element)?,
        })
    }
}

impl fmt::Display for SuiteCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tests={} failures={} disabled={} errors={} time={}",
            self.tests, self.failures, self.disabled, self.errors, self.time
        )
    }
}

fn count_attribute(element: &XmlElement, key: &str) -> Result<u64, RunnerError> {
    match element.attribute(key).map(str::trim) {
        None | Some("") => Ok(0),
        Some(raw) => raw.parse().map_err(|_| {
            RunnerError::malformed(format!("testsuite {key} '{raw}' is not a count"))
        }),
    }
}

/// Elapsed seconds; only finite, non-negative values can be summed
fn time_attribute(element: &XmlElement) -> Result<f64, RunnerError> {
    let raw = match element.attribute("time").map(str::trim) {
        None | Some("") => return Ok(0.0),
        Some(raw) => raw,
    };
    match raw.parse::<f64>() {
        Ok(time) if time.is_finite() && time >= 0.0 => Ok(time),
        _ => Err(RunnerError::malformed(format!(
            "testsuite time '{raw}' is not a duration"
        ))),
    }
}

/// One `<testcase>` record, kept verbatim
#[derive(Clone, Debug, PartialEq)]
pub struct TestCaseRecord(XmlElement);

impl TestCaseRecord {
    /// Record for a page that could not be run at all
    pub fn synthetic_failure(name: &str, message: &str) -> Self {
        Self(
            XmlElement::new("testcase")
                .with_attribute("name", name)
                .with_attribute("classname", name)
                .with_attribute("time", "0")
                .with_child(XmlElement::new("failure").with_attribute("message", message)),
        )
    }

    pub fn name(&self) -> &str {
        self.0.attribute("name").unwrap_or_default()
    }

    pub fn time(&self) -> Option<f64> {
        self.0.attribute("time").and_then(|t| t.trim().parse().ok())
    }

    /// Message of the first `<failure>` or `<error>` child
    pub fn failure_message(&self) -> Option<&str> {
        self.0
            .elements()
            .find(|child| child.name == "failure" || child.name == "error")
            .map(|child| child.attribute("message").unwrap_or_default())
    }

    pub fn is_failed(&self) -> bool {
        self.failure_message().is_some()
    }

    pub fn element(&self) -> &XmlElement {
        &self.0
    }

    /// Whether this record belongs to the page called `page_name`.
    ///
    /// FitNesse reports either the full dotted path or a path relative to the
    /// suite that was run, so a dotted-suffix match is accepted either way.
    pub fn matches_page(&self, page_name: &str) -> bool {
        let name = self.name();
        if name.is_empty() {
            return false;
        }
        name == page_name
            || page_name.ends_with(&format!(".{name}"))
            || name.ends_with(&format!(".{page_name}"))
    }
}

/// Parsed `<testsuite>` document for one page run
#[derive(Clone, Debug, PartialEq)]
pub struct TestSuiteDocument {
    pub name: Option<String>,
    pub counters: SuiteCounters,
    pub testcases: Vec<TestCaseRecord>,
}

impl TestSuiteDocument {
    pub fn parse(xml: &str) -> Result<Self, RunnerError> {
        let root = XmlElement::parse(xml)
            .map_err(|e| RunnerError::malformed(format!("test result is not valid XML: {e:#}")))?;

        let suite = match root.name.as_str() {
            "testsuite" => &root,
            "testsuites" => root.elements_named("testsuite").next().ok_or_else(|| {
                RunnerError::malformed("test result <testsuites> has no <testsuite>")
            })?,
            other => {
                return Err(RunnerError::malformed(format!(
                    "test result root is <{other}>, expected <testsuite>"
                )))
            }
        };

        Ok(Self {
            name: suite.attribute("name").map(str::to_string),
            counters: SuiteCounters::from_element(suite)?,
            testcases: suite
                .elements_named("testcase")
                .cloned()
                .map(TestCaseRecord)
                .collect(),
        })
    }

    /// Remove and return the record for `page_name`
    pub fn take_testcase(&mut self, page_name: &str) -> Option<TestCaseRecord> {
        let index = self.testcases.iter().position(|tc| tc.matches_page(page_name))?;
        Some(self.testcases.remove(index))
    }
}
