//! Web search + page fetch retriever.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use super::extract::extract_text;
use super::http_client::HttpClient;
use super::search::{build_query, is_denied, parse_result_links};
use super::{ContentRetriever, RetrievalError};
use crate::config::Settings;
use crate::models::ScrapedContent;

/// Retriever backed by an HTML search endpoint and plain page fetches.
pub struct WebRetriever {
    http: HttpClient,
    search_url: String,
}

impl WebRetriever {
    pub fn new(
        search_url: &str,
        timeout: Duration,
        user_agent: Option<&str>,
    ) -> Result<Self, RetrievalError> {
        Ok(Self {
            http: HttpClient::with_user_agent(timeout, user_agent)?,
            search_url: search_url.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, RetrievalError> {
        Self::new(
            &settings.search_url,
            Duration::from_secs(settings.request_timeout),
            settings.user_agent.as_deref(),
        )
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }
}

#[async_trait]
impl ContentRetriever for WebRetriever {
    async fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        let html = self.http.get_text(url, &[]).await?;
        match extract_text(&html) {
            Some(text) => {
                debug!("Extracted {} chars from {}", text.len(), url);
                Ok(text)
            }
            None => {
                error!("Error scraping content from {}: no readable text", url);
                Err(RetrievalError::Extraction {
                    url: url.to_string(),
                })
            }
        }
    }

    async fn search(&self, supplier: &str, product: &str) -> Result<ScrapedContent, RetrievalError> {
        let query = build_query(supplier, product);
        info!("Searching for '{}'", query);

        let page = self
            .http
            .get_text(&self.search_url, &[("q", query.as_str())])
            .await
            .inspect_err(|e| error!("Search for '{}' failed: {}", query, e))?;

        let links = parse_result_links(&page, &self.search_url)?;
        let Some(url) = links.into_iter().find(|u| {
            let denied = is_denied(u);
            if denied {
                debug!("Skipping denylisted result {}", u);
            }
            !denied
        }) else {
            error!("No search results found for '{}'", query);
            return Err(RetrievalError::NoResults { query });
        };

        info!("Fetching content from {}", url);
        let content = self.fetch(&url).await?;
        Ok(ScrapedContent::new(url, content))
    }
}
