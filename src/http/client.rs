//! HTTP client for FitNesse servers
//!
//! Thin wrapper over reqwest that maps transport failures onto [`HttpError`].

use anyhow::{Context, Result};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
}

/// HTTP client
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout_secs: u64,
}

impl HttpClient {
    /// Create client with custom timeout
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Send HTTP request
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        debug!("Sending {} request to {}", request.method, url);

        let method =
            Method::from_bytes(request.method.as_bytes()).context("Invalid HTTP method")?;

        let mut req_builder = self.client.request(method, &url);

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let start = std::time::Instant::now();

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!(HttpError::Timeout(self.timeout_secs))
            } else if e.is_connect() {
                anyhow::anyhow!(HttpError::ConnectionRefused(url.clone()))
            } else if e.is_builder() {
                anyhow::anyhow!(HttpError::InvalidUrl(url.clone()))
            } else {
                anyhow::anyhow!(HttpError::RequestFailed(e.to_string()))
            }
        })?;

        let elapsed = start.elapsed();
        let status = response.status();

        let body = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!(HttpError::RequestFailed(e.to_string())))
            .context("Failed to read response body")?;

        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            elapsed.as_millis()
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            body,
        })
    }

    /// Convenience method for GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::get(url)).await
    }

    /// GET that fails on a non-2xx status and returns the body
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: response.status_code,
            }
            .into());
        }
        Ok(response.body)
    }

    /// GET and decode the body as JSON
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).with_context(|| format!("Invalid JSON from {url}"))
    }
}

/// HTTP request builder
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new("PUT", url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// HTTP response
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let req = HttpRequest::put("http://example.com/container")
            .header("x-ms-version", "2021-08-06")
            .header("Content-Type", "application/xml")
            .body("<testsuite/>");

        assert_eq!(req.method, "PUT");
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.body.as_deref(), Some("<testsuite/>"));
    }

    #[test]
    fn test_http_response_success_range() {
        let response = |status_code| HttpResponse {
            status_code,
            body: String::new(),
        };

        assert!(response(200).is_success());
        assert!(response(201).is_success());
        assert!(!response(409).is_success());
        assert!(!response(500).is_success());
    }

    #[test]
    fn test_status_error_message() {
        let err = HttpError::Status {
            url: "http://host0:8080/Suite".to_string(),
            status: 500,
        };
        assert_eq!(
            err.to_string(),
            "Unexpected status 500 from http://host0:8080/Suite"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_mapped() {
        let client = HttpClient::with_timeout(5).unwrap();
        // Port 9 (discard) is closed on loopback in test environments
        let err = client.get_text("http://127.0.0.1:9/FrontPage").await.unwrap_err();
        assert!(err.downcast_ref::<HttpError>().is_some());
    }
}
