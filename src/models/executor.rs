//! Executors and pages
//!
//! An executor is one FitNesse server; a page is one unit of test work.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RunnerError;

/// Placeholder expanded to the server index in executor templates
const TEMPLATE_PLACEHOLDER: &str = "{0}";

/// A remote FitNesse server (`host:port`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Executor(String);

impl Executor {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Base URL of the wiki served by this executor
    pub fn base_url(&self) -> String {
        if self.0.starts_with("http://") || self.0.starts_with("https://") {
            self.0.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.0.trim_end_matches('/'))
        }
    }

    /// Expand `template` into `count` executors, replacing `{0}` with 0..count.
    ///
    /// A template without the placeholder only makes sense for a single server.
    pub fn from_template(template: &str, count: usize) -> Result<Vec<Executor>, RunnerError> {
        if count == 0 {
            return Err(RunnerError::configuration("servers count must be at least 1"));
        }
        if template.trim().is_empty() {
            return Err(RunnerError::configuration("servers template is empty"));
        }
        if count > 1 && !template.contains(TEMPLATE_PLACEHOLDER) {
            return Err(RunnerError::configuration(format!(
                "servers template '{template}' has no {TEMPLATE_PLACEHOLDER} placeholder for {count} servers"
            )));
        }

        Ok((0..count)
            .map(|i| Executor::new(template.replace(TEMPLATE_PLACEHOLDER, &i.to_string())))
            .collect())
    }
}

impl fmt::Display for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A wiki page to run, addressed by its full dotted path
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    name: String,
}

impl Page {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Page `leaf` below `suite`, as returned by a `LeafOnly` names query
    pub fn in_suite(suite: &str, leaf: &str) -> Self {
        Self::new(format!("{suite}.{leaf}"))
    }

    /// Full dotted page path, e.g. `FrontPage.SuiteA.TestOne`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Page URL on `executor` with `query` appended
    pub fn url(&self, executor: &Executor, query: &str) -> String {
        format!("{}/{}?{}", executor.base_url(), self.name, query)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Turn the body of a `names&Recursive&LeafOnly` query into pages of `suite`
pub fn pages_from_listing(suite: &str, listing: &str) -> Vec<Page> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|leaf| Page::in_suite(suite, leaf))
        .collect()
}
