//! Headless-browser renderer for odds pages.
//!
//! Odds tables are filled in by page scripts, so a plain GET returns an
//! empty shell. Each fetch launches its own Chrome instance on a blocking
//! thread and returns the DOM once the odds rows appear. The browser is
//! owned by the render call, so it is torn down on every exit path.

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use secrecy::SecretString;
use std::ffi::OsStr;
use std::time::Duration;
use tracing::debug;

use super::PageFetcher;
use crate::config::proxy_endpoint;
use crate::types::FetchError;

pub struct BrowserFetcher {
    /// `scheme://host:port` only. Chrome takes no credentials on the command line.
    proxy_server: Option<String>,
    user_agent: String,
    accept_language: String,
    /// CSS selector that must match before the page counts as rendered.
    ready_selector: String,
    render_wait: Duration,
}

impl BrowserFetcher {
    pub fn new(
        proxy_url: Option<SecretString>,
        user_agent: String,
        accept_language: String,
        ready_selector: String,
        render_wait: Duration,
    ) -> Self {
        Self {
            proxy_server: proxy_url.as_ref().map(proxy_endpoint),
            user_agent,
            accept_language,
            ready_selector,
            render_wait,
        }
    }
}

struct RenderJob {
    url: String,
    proxy: Option<String>,
    user_agent: String,
    accept_language: String,
    ready_selector: String,
    render_wait: Duration,
    timeout: Duration,
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let job = RenderJob {
            url: url.to_string(),
            proxy: self.proxy_server.clone(),
            user_agent: self.user_agent.clone(),
            accept_language: self.accept_language.clone(),
            ready_selector: self.ready_selector.clone(),
            render_wait: self.render_wait,
            timeout,
        };

        tokio::task::spawn_blocking(move || render(job))
            .await
            .map_err(|e| FetchError::Resource(format!("render task aborted: {e}")))?
    }
}

fn render(job: RenderJob) -> Result<String, FetchError> {
    let network = |reason: String| FetchError::Network {
        url: job.url.clone(),
        reason,
    };

    let options = LaunchOptions {
        headless: true,
        sandbox: false,
        proxy_server: job.proxy.as_deref(),
        idle_browser_timeout: job.timeout + job.render_wait,
        args: vec![
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--ignore-certificate-errors"),
        ],
        ..Default::default()
    };

    let browser = Browser::new(options)
        .map_err(|e| FetchError::Resource(format!("failed to launch browser: {e}")))?;
    let tab = browser
        .new_tab()
        .map_err(|e| FetchError::Resource(format!("failed to open tab: {e}")))?;

    tab.set_user_agent(&job.user_agent, Some(&job.accept_language), None)
        .map_err(|e| network(format!("failed to set user agent: {e}")))?;
    tab.set_default_timeout(job.timeout);

    debug!(url = %job.url, "Rendering page");
    tab.navigate_to(&job.url)
        .map_err(|e| network(format!("navigation failed: {e}")))?;
    tab.wait_for_element_with_custom_timeout(&job.ready_selector, job.render_wait)
        .map_err(|_| FetchError::Timeout {
            url: job.url.clone(),
        })?;

    tab.get_content()
        .map_err(|e| network(format!("failed to read DOM: {e}")))
}
