//! Content retrieval: web search, candidate filtering and page text extraction.

pub mod extract;
mod http_client;
pub mod search;
pub mod web;

use async_trait::async_trait;

pub use http_client::{resolve_user_agent, HttpClient, IMPERSONATE_USER_AGENTS, USER_AGENT};
pub use web::WebRetriever;

use crate::models::ScrapedContent;

/// Errors raised while searching for or extracting content.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("No search results for '{query}'")]
    NoResults { query: String },

    #[error("Could not extract readable text from {url}")]
    Extraction { url: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Swappable source of scraped product content.
#[async_trait]
pub trait ContentRetriever: Send + Sync {
    /// Fetch `url` and extract its readable body text.
    async fn fetch(&self, url: &str) -> Result<String, RetrievalError>;

    /// Search for the pair and return the first acceptable result's text.
    async fn search(&self, supplier: &str, product: &str) -> Result<ScrapedContent, RetrievalError>;
}
