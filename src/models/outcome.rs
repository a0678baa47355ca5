//! Page properties and per-page outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::results::TestSuiteDocument;

/// Subset of the `?properties&format=json` response the runner cares about
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProperties {
    #[serde(rename = "Test", default)]
    pub test: bool,

    #[serde(rename = "Prune", default)]
    pub prune: bool,
}

/// Why a page produced no result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotATest,
    Pruned,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotATest => write!(f, "not a test"),
            SkipReason::Pruned => write!(f, "pruned"),
        }
    }
}

/// Terminal outcome of one page
#[derive(Clone, Debug)]
pub enum TestOutcome {
    Skipped(SkipReason),
    Completed {
        document: TestSuiteDocument,
        attempts: u32,
    },
    Failed {
        name: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_from_fitnesse_json() {
        let props: PageProperties =
            serde_json::from_str(r#"{"Test": true, "Edit": true, "Prune": false, "Help": ""}"#)
                .unwrap();
        assert!(props.test);
        assert!(!props.prune);
    }

    #[test]
    fn test_missing_properties_default_to_false() {
        let props: PageProperties = serde_json::from_str("{}").unwrap();
        assert_eq!(props, PageProperties::default());
    }
}
