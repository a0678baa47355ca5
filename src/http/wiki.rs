//! FitNesse wiki queries
//!
//! The three responder calls the runner needs: list leaf pages of a suite,
//! read page properties, run a page and get a JUnit result.

use anyhow::Result;
use async_trait::async_trait;

use super::client::HttpClient;
use crate::models::{Executor, Page, PageProperties};

const NAMES_QUERY: &str = "names&Recursive&LeafOnly";
const PROPERTIES_QUERY: &str = "properties&format=json";
const TEST_QUERY: &str = "suite&format=junit";

/// Remote wiki operations used by the runner
#[async_trait]
pub trait WikiClient: Send + Sync {
    /// Newline separated leaf page names below `suite`
    async fn list_pages(&self, executor: &Executor, suite: &str) -> Result<String>;

    /// Page properties (`Test`, `Prune`, ...)
    async fn page_properties(&self, executor: &Executor, page: &Page) -> Result<PageProperties>;

    /// Run `page` and return the raw JUnit XML result
    async fn run_test(&self, executor: &Executor, page: &Page) -> Result<String>;
}

/// [`WikiClient`] talking to real FitNesse servers over HTTP
#[derive(Clone)]
pub struct FitnesseClient {
    http: HttpClient,
}

impl FitnesseClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Ok(Self::new(HttpClient::with_timeout(timeout_secs)?))
    }
}

#[async_trait]
impl WikiClient for FitnesseClient {
    async fn list_pages(&self, executor: &Executor, suite: &str) -> Result<String> {
        let url = Page::new(suite).url(executor, NAMES_QUERY);
        self.http.get_text(&url).await
    }

    async fn page_properties(&self, executor: &Executor, page: &Page) -> Result<PageProperties> {
        self.http
            .get_json(&page.url(executor, PROPERTIES_QUERY))
            .await
    }

    async fn run_test(&self, executor: &Executor, page: &Page) -> Result<String> {
        self.http.get_text(&page.url(executor, TEST_QUERY)).await
    }
}
