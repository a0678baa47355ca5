//! Output formatting module
//!
//! Renders the final report for stdout.

mod formatter;

pub use formatter::{OutputFormat, ReportFormatter};
