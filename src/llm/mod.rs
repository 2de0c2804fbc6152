//! Inference oracle: asks a text-generation backend to answer catalog
//! columns and to critique its own answers.

mod client;

use async_trait::async_trait;

pub use client::{LlmClient, LlmConfig, LlmError, LlmProvider};

use crate::models::{CatalogRow, ValidationResult};

/// Generated answers keyed by question field, in model output order.
pub type AiResponses = CatalogRow;

/// Black-box structured-output backend.
///
/// Both calls are single attempts; malformed output is an error, never
/// coerced or retried.
#[async_trait]
pub trait InferenceOracle: Send + Sync {
    /// Answer every question field from the existing rows and scraped text.
    async fn generate(
        &self,
        existing_rows: &[CatalogRow],
        scraped_text: &str,
        question_fields: &[String],
    ) -> Result<AiResponses, LlmError>;

    /// Judge the generated answers for consistency, format and business rules.
    async fn validate(
        &self,
        responses: &AiResponses,
        question_fields: &[String],
    ) -> Result<ValidationResult, LlmError>;
}
