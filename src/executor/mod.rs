//! Test execution engine
//!
//! The executor pool scheduler, the per-page runner and the suite runner
//! that ties them to discovery and aggregation.

mod pool;
mod runner;
mod suite;

pub use suite::SuiteRunner;
