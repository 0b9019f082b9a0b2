//! Plain HTTP page client.
//!
//! Two instances are built per run: one routed through the forward proxy
//! and one direct, because the primary source must bypass the proxy while
//! the mirror and race pages go through it. Both share one response cache.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::{Client, Proxy};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::cache::ResponseCache;
use super::PageFetcher;
use crate::config::NetworkConfig;
use crate::types::FetchError;

/// Which network path a client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Proxied,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Direct => write!(f, "direct"),
            Route::Proxied => write!(f, "proxied"),
        }
    }
}

pub struct RequestClient {
    http: Client,
    route: Route,
    cache: Option<Arc<ResponseCache>>,
}

impl RequestClient {
    /// A client that ignores any proxy, including ones set in the environment.
    pub fn direct(net: &NetworkConfig, cache: Option<Arc<ResponseCache>>) -> Result<Self> {
        let http = Self::builder(net)?
            .no_proxy()
            .build()
            .context("Failed to build direct HTTP client")?;
        Ok(Self {
            http,
            route: Route::Direct,
            cache,
        })
    }

    /// A client that sends every request through `proxy_url`.
    pub fn proxied(
        net: &NetworkConfig,
        proxy_url: &SecretString,
        cache: Option<Arc<ResponseCache>>,
    ) -> Result<Self> {
        let proxy = Proxy::all(proxy_url.expose_secret().as_str())
            .context("Invalid proxy URL")?;
        let http = Self::builder(net)?
            .proxy(proxy)
            .build()
            .context("Failed to build proxied HTTP client")?;
        Ok(Self {
            http,
            route: Route::Proxied,
            cache,
        })
    }

    fn builder(net: &NetworkConfig) -> Result<reqwest::ClientBuilder> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&net.accept_language).context("Invalid Accept-Language")?,
        );
        Ok(Client::builder()
            .user_agent(net.user_agent.clone())
            .default_headers(headers))
    }

    pub fn route(&self) -> Route {
        self.route
    }
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for RequestClient {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(url).await {
                debug!(url, route = %self.route, "Cache hit");
                return Ok(body);
            }
        }

        debug!(url, route = %self.route, "GET");

        let resp = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| classify(url, e))?;

        if let Some(cache) = &self.cache {
            cache.put(url, &body).await;
        }

        Ok(body)
    }
}
