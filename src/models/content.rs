//! Scraped web content.

use serde::{Deserialize, Serialize};

/// Readable text extracted from the first acceptable search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub source_url: String,
    pub content: String,
}

impl ScrapedContent {
    pub fn new(source_url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            content: content.into(),
        }
    }
}
