//! Page fetching.
//!
//! Defines the `PageFetcher` trait and its implementations: a plain HTTP
//! client (direct or through the forward proxy) with a persistent response
//! cache, and a headless-browser renderer for script-populated pages.

pub mod browser;
pub mod cache;
pub mod client;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::FetchError;

/// Abstraction over anything that can turn a URL into page text.
///
/// Implementations never retry; callers own the retry policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`, giving up after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}
