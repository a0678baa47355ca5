//! Data models
//!
//! Executors, pages and the outcome of running one page.

mod executor;
mod outcome;

pub use executor::{pages_from_listing, Executor, Page};
pub use outcome::{PageProperties, SkipReason, TestOutcome};
