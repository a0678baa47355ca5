//! Output formatters for run reports
//!
//! JUnit XML, JSON, table and one-line summary renderings of an
//! [`AggregateReport`].

use anyhow::{Context, Result};

use crate::results::AggregateReport;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Xml,
    Json,
    JsonPretty,
    Table,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "xml" | "junit" => Some(OutputFormat::Xml),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "table" => Some(OutputFormat::Table),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Report formatter
pub struct ReportFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ReportFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn format_report(&self, report: &AggregateReport) -> Result<String> {
        match self.format {
            OutputFormat::Xml => report.to_xml(),
            OutputFormat::Json => {
                serde_json::to_string(&report.summary()).context("Failed to serialize report")
            }
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&report.summary())
                .context("Failed to serialize report"),
            OutputFormat::Table => Ok(self.format_table(report)),
            OutputFormat::Summary => Ok(Self::format_brief(report)),
        }
    }

    fn format_table(&self, report: &AggregateReport) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        let verdict = if report.is_all_passed() { "PASSED" } else { "FAILED" };
        output.push_str(&format!(
            "║  {:50} {:>6}  ║\n",
            truncate(&report.name, 50),
            verdict
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for testcase in &report.testcases {
            let status = match (testcase.is_failed(), self.colorize) {
                (false, true) => "\x1b[32m✓ PASS\x1b[0m",
                (false, false) => "✓ PASS",
                (true, true) => "\x1b[31m✗ FAIL\x1b[0m",
                (true, false) => "✗ FAIL",
            };
            output.push_str(&format!(
                "║  {} {:44} {:>7.2}s  ║\n",
                status,
                truncate(testcase.name(), 44),
                testcase.time().unwrap_or_default()
            ));
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        let counters = &report.counters;
        output.push_str(&format!(
            "║  Tests: {:4} | Failures: {:4} | Errors: {:4} | Disabled: {:4} ║\n",
            counters.tests, counters.failures, counters.errors, counters.disabled
        ));
        output.push_str(&format!("║  Time: {:10.2}s{:44}║\n", counters.time, ""));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        let failed = report.summary().failed;
        if !failed.is_empty() {
            output.push_str("\nFailed:\n");
            for case in failed {
                output.push_str(&format!("  {}: {}\n", case.name, case.message));
            }
        }

        output
    }

    /// One line, also used for the log after every run
    pub fn format_brief(report: &AggregateReport) -> String {
        let counters = &report.counters;
        format!(
            "{}: {} tests, {} failures, {} errors, {} disabled in {:.2}s",
            report.name,
            counters.tests,
            counters.failures,
            counters.errors,
            counters.disabled,
            counters.time
        )
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::fixtures::page_result;
    use crate::results::TestSuiteDocument;

    fn report() -> AggregateReport {
        let mut report = AggregateReport::new("Suite");
        let doc = TestSuiteDocument::parse(&page_result("Suite.A", 0, 0, 1.5)).unwrap();
        report.append_success("Suite.A", doc).unwrap();
        report.append_failure("Suite.B", "boom");
        report
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("XML"), Some(OutputFormat::Xml));
        assert_eq!(OutputFormat::from_str("junit"), Some(OutputFormat::Xml));
        assert_eq!(OutputFormat::from_str("table"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("csv"), None);
    }

    #[test]
    fn test_brief_summary() {
        assert_eq!(
            ReportFormatter::format_brief(&report()),
            "Suite: 2 tests, 0 failures, 1 errors, 0 disabled in 1.50s"
        );
    }

    #[test]
    fn test_json_lists_failed_pages() {
        let json = ReportFormatter::new(OutputFormat::Json)
            .format_report(&report())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["name"], "Suite");
        assert_eq!(value["counters"]["tests"], 2);
        assert_eq!(value["failed"][0]["name"], "Suite.B");
        assert_eq!(value["failed"][0]["message"], "boom");
    }

    #[test]
    fn test_table_without_color() {
        let table = ReportFormatter::new(OutputFormat::Table)
            .no_color()
            .format_report(&report())
            .unwrap();

        assert!(table.contains("✓ PASS Suite.A"));
        assert!(table.contains("✗ FAIL Suite.B"));
        assert!(table.contains("Suite.B: boom"));
        assert!(table.contains("FAILED"));
        assert!(!table.contains("\x1b["));
    }

    #[test]
    fn test_xml_is_the_junit_document() {
        let xml = ReportFormatter::new(OutputFormat::Xml)
            .format_report(&report())
            .unwrap();
        assert!(xml.contains(r#"<testsuite name="Suite" tests="2""#));
    }
}
