//! HTTP client shared by search and page fetches.

mod user_agent;

pub use user_agent::{resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::debug;

use super::RetrievalError;

/// HTTP client with a fixed user agent and request timeout.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with custom user agent configuration.
    /// - None: Use default catalog-enrich user agent
    /// - Some("impersonate"): Use random real browser user agent
    /// - Some(custom): Use custom user agent string
    pub fn with_user_agent(
        timeout: Duration,
        user_agent_config: Option<&str>,
    ) -> Result<Self, RetrievalError> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()
            .map_err(|e| RetrievalError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// GET a page and return its body; non-2xx statuses are errors.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<String, RetrievalError> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| RetrievalError::Http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        debug!(
            "GET {} -> {} in {}ms",
            url,
            status,
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            return Err(RetrievalError::Http(format!("GET {} returned {}", url, status)));
        }

        response
            .text()
            .await
            .map_err(|e| RetrievalError::Http(format!("Failed to read body of {}: {}", url, e)))
    }
}
