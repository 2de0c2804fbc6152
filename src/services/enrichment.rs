//! Catalog enrichment service.
//!
//! Runs the generate-entry pipeline: read existing rows, retrieve web
//! content, generate answers, have the model review them, validate the new
//! row and persist it. Every step is a single attempt; the first failure ends
//! the request and nothing is written.

use std::sync::Arc;

use chrono::{Timelike, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::llm::{AiResponses, InferenceOracle, LlmError};
use crate::models::{
    CatalogRow, TableData, ValidationResult, CREATION_DATE, ID, PRODUCT_NAME, SUPPLIER_NAME,
};
use crate::repository::{CatalogStore, StoreError};
use crate::scrapers::{ContentRetriever, RetrievalError};
use crate::validation::{RowValidator, ValidationError};

/// Columns the model is never allowed to fill.
const RESERVED_COLUMNS: &[&str] = &[ID, CREATION_DATE, SUPPLIER_NAME, PRODUCT_NAME];

/// Coarse failure category, used for HTTP status and CLI reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StoreUnavailable,
    Store,
    NoResults,
    Extraction,
    Oracle,
    Format,
    Duplicate,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoreUnavailable => "store_unavailable",
            Self::Store => "store",
            Self::NoResults => "no_results",
            Self::Extraction => "extraction",
            Self::Oracle => "oracle",
            Self::Format => "format",
            Self::Duplicate => "duplicate",
        }
    }

    /// HTTP status reported for this kind of failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::StoreUnavailable => 503,
            Self::Duplicate => 409,
            Self::Format => 422,
            Self::NoResults => 404,
            Self::Extraction | Self::Oracle => 502,
            Self::Store => 500,
        }
    }
}

/// Terminal failure of a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] LlmError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(StoreError::Unavailable(_)) => ErrorKind::StoreUnavailable,
            Self::Store(StoreError::UniqueViolation { .. }) => ErrorKind::Duplicate,
            Self::Store(_) => ErrorKind::Store,
            Self::Retrieval(RetrievalError::NoResults { .. }) => ErrorKind::NoResults,
            Self::Retrieval(_) => ErrorKind::Extraction,
            Self::Oracle(_) => ErrorKind::Oracle,
            Self::Validation(e) if e.is_duplicate() => ErrorKind::Duplicate,
            Self::Validation(_) => ErrorKind::Format,
        }
    }
}

/// A row that was written to the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct PersistedEntry {
    pub table: String,
    pub source_url: String,
    pub row: CatalogRow,
}

/// Outcome of one generate-entry request.
#[derive(Debug)]
pub enum EntryOutcome {
    Persisted(PersistedEntry),
    /// The model's own review rejected the generated answers.
    RejectedByValidation(ValidationResult),
    Failed(PipelineError),
}

impl EntryOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }
}

/// Composes store, retriever, oracle and validator behind one entry point.
pub struct Orchestrator {
    store: Arc<dyn CatalogStore>,
    retriever: Arc<dyn ContentRetriever>,
    oracle: Arc<dyn InferenceOracle>,
    validator: RowValidator,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        retriever: Arc<dyn ContentRetriever>,
        oracle: Arc<dyn InferenceOracle>,
    ) -> Self {
        Self {
            store,
            retriever,
            oracle,
            validator: RowValidator::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Generate, validate and persist a new row for the pair.
    pub async fn generate_entry(&self, supplier: &str, product: &str, table: &str) -> EntryOutcome {
        match self.run(supplier, product, table).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    "Error in generate_entry for {}/{} on {}: {}",
                    supplier, product, table, e
                );
                EntryOutcome::Failed(e)
            }
        }
    }

    async fn run(
        &self,
        supplier: &str,
        product: &str,
        table: &str,
    ) -> Result<EntryOutcome, PipelineError> {
        info!("Reading existing rows from {} for {}/{}", table, supplier, product);
        let existing = self.store.read(table).await?;
        let questions = existing.question_fields().to_vec();

        info!("Retrieving web content for {}/{}", supplier, product);
        let scraped = self.retriever.search(supplier, product).await?;

        info!(
            "Generating {} answers for {}/{} from {}",
            questions.len(),
            supplier,
            product,
            scraped.source_url
        );
        let responses = self
            .oracle
            .generate(&existing.rows, &scraped.content, &questions)
            .await?;

        info!("Reviewing generated answers for {}/{}", supplier, product);
        let review = self.oracle.validate(&responses, &questions).await?;
        if !review.is_valid {
            warn!(
                "Generated data for {}/{} failed validation: {:?}",
                supplier,
                product,
                review.invalid_fields()
            );
            return Ok(EntryOutcome::RejectedByValidation(review));
        }

        let mut row = assemble_row(supplier, product, &questions, responses);

        info!("Validating new row for {}/{}", supplier, product);
        self.validator.check_format(&mut row)?;
        self.validator.check_uniqueness(&row, &existing.rows)?;

        if !questions.iter().any(|q| q == CREATION_DATE) {
            debug!("{} has no {} column, leaving it out", table, CREATION_DATE);
            row.remove(CREATION_DATE);
        }

        info!("Persisting new row for {}/{} into {}", supplier, product, table);
        self.store.insert(table, &row).await?;

        Ok(EntryOutcome::Persisted(PersistedEntry {
            table: table.to_string(),
            source_url: scraped.source_url,
            row,
        }))
    }

    /// Read a table without touching the pipeline.
    pub async fn get_table_data(&self, table: &str) -> Result<TableData, PipelineError> {
        Ok(self.store.read(table).await?)
    }
}

/// Build the new row: identity from the request, a creation timestamp, and
/// the model's answers for non-reserved question fields.
fn assemble_row(
    supplier: &str,
    product: &str,
    questions: &[String],
    responses: AiResponses,
) -> CatalogRow {
    let mut row = CatalogRow::with_identity(supplier, product);
    let now = Utc::now().naive_utc();
    row.insert(CREATION_DATE, now.with_nanosecond(0).unwrap_or(now));

    for (field, value) in responses {
        if RESERVED_COLUMNS.contains(&field.as_str()) {
            debug!("Discarding generated value for reserved column {}", field);
            continue;
        }
        if !questions.iter().any(|q| *q == field) {
            warn!("Dropping answer for unknown column {}", field);
            continue;
        }
        row.insert(field, value);
    }
    row
}
