//! HTTP module
//!
//! HTTP client plus the FitNesse wiki queries built on it.

mod client;
mod wiki;

pub use client::{HttpClient, HttpRequest, HttpResponse};
pub use wiki::{FitnesseClient, WikiClient};
