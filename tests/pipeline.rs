//! End-to-end generate-entry scenarios against a real SQLite catalog.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use catalog_enrich::llm::{AiResponses, InferenceOracle, LlmError};
use catalog_enrich::models::{
    CatalogRow, CellValue, FieldValidation, ScrapedContent, ValidationResult, DEFAULT_TABLE,
};
use catalog_enrich::repository::{CatalogStore, SqliteCatalogStore};
use catalog_enrich::scrapers::{ContentRetriever, RetrievalError};
use catalog_enrich::services::{EntryOutcome, ErrorKind, Orchestrator};

const SOURCE_URL: &str = "https://acme.example/widget";

struct StaticRetriever {
    found: bool,
}

#[async_trait]
impl ContentRetriever for StaticRetriever {
    async fn fetch(&self, _url: &str) -> Result<String, RetrievalError> {
        Ok("Acme Widget. Color: red.".to_string())
    }

    async fn search(&self, supplier: &str, product: &str) -> Result<ScrapedContent, RetrievalError> {
        if self.found {
            Ok(ScrapedContent::new(SOURCE_URL, "Acme Widget. Color: red."))
        } else {
            Err(RetrievalError::NoResults {
                query: format!("{} {} specifications", supplier, product),
            })
        }
    }
}

struct ScriptedOracle {
    answers: AiResponses,
    approve: bool,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    fn new(answers: AiResponses, approve: bool) -> Self {
        Self {
            answers,
            approve,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InferenceOracle for ScriptedOracle {
    async fn generate(
        &self,
        _existing: &[CatalogRow],
        _content: &str,
        _questions: &[String],
    ) -> Result<AiResponses, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers.clone())
    }

    async fn validate(
        &self,
        responses: &AiResponses,
        _questions: &[String],
    ) -> Result<ValidationResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let validation_details = responses
            .columns()
            .map(|field| {
                let verdict = FieldValidation {
                    valid: self.approve,
                    issues: if self.approve {
                        Vec::new()
                    } else {
                        vec!["not supported by content".to_string()]
                    },
                };
                (field.to_string(), verdict)
            })
            .collect();
        Ok(ValidationResult {
            is_valid: self.approve,
            validation_details,
        })
    }
}

async fn catalog_with_color_column() -> (Arc<SqliteCatalogStore>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let store = SqliteCatalogStore::from_path(&path);
    store.ensure_default_table().await.unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("ALTER TABLE supplier_products ADD COLUMN color TEXT", [])
        .unwrap();

    (Arc::new(store), dir)
}

fn red_answers() -> AiResponses {
    let mut answers = AiResponses::new();
    answers.insert("color", "red");
    answers
}

fn orchestrator(
    store: Arc<SqliteCatalogStore>,
    found: bool,
    oracle: Arc<ScriptedOracle>,
) -> Orchestrator {
    Orchestrator::new(store, Arc::new(StaticRetriever { found }), oracle)
}

#[tokio::test]
async fn approved_entry_is_persisted_with_tagged_answers() {
    let (store, _dir) = catalog_with_color_column().await;
    let oracle = Arc::new(ScriptedOracle::new(red_answers(), true));
    let pipeline = orchestrator(store.clone(), true, oracle);

    let outcome = pipeline
        .generate_entry("Acme", "Widget", DEFAULT_TABLE)
        .await;

    let entry = match outcome {
        EntryOutcome::Persisted(entry) => entry,
        other => panic!("expected persisted entry, got {:?}", other),
    };
    assert_eq!(entry.source_url, SOURCE_URL);
    assert_eq!(entry.table, DEFAULT_TABLE);

    let data = store.read(DEFAULT_TABLE).await.unwrap();
    assert_eq!(data.rows.len(), 1);
    let row = &data.rows[0];
    assert_eq!(row.get("supplier_name"), Some(&CellValue::from("Acme")));
    assert_eq!(row.get("product_name"), Some(&CellValue::from("Widget")));
    assert_eq!(
        row.get("color"),
        Some(&CellValue::from("red [AI generated]"))
    );
    assert!(matches!(row.get("id"), Some(CellValue::Integer(_))));
    assert!(matches!(row.get("creation_date"), Some(CellValue::Timestamp(_))));
}

#[tokio::test]
async fn rejected_review_writes_nothing() {
    let (store, _dir) = catalog_with_color_column().await;
    let oracle = Arc::new(ScriptedOracle::new(red_answers(), false));
    let pipeline = orchestrator(store.clone(), true, oracle);

    let outcome = pipeline
        .generate_entry("Acme", "Widget", DEFAULT_TABLE)
        .await;

    match outcome {
        EntryOutcome::RejectedByValidation(review) => {
            assert!(!review.is_valid);
            assert_eq!(review.invalid_fields(), vec!["color"]);
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(store.read(DEFAULT_TABLE).await.unwrap().rows.is_empty());
}

#[tokio::test]
async fn existing_pair_is_reported_as_duplicate() {
    let (store, _dir) = catalog_with_color_column().await;
    let mut existing = CatalogRow::with_identity("Acme", "Widget");
    existing.insert("color", "blue");
    store.insert(DEFAULT_TABLE, &existing).await.unwrap();

    let oracle = Arc::new(ScriptedOracle::new(red_answers(), true));
    let pipeline = orchestrator(store.clone(), true, oracle);

    let outcome = pipeline
        .generate_entry("Acme", "Widget", DEFAULT_TABLE)
        .await;

    match outcome {
        EntryOutcome::Failed(e) => {
            assert_eq!(e.kind(), ErrorKind::Duplicate);
            assert_eq!(e.kind().status_code(), 409);
        }
        other => panic!("expected duplicate failure, got {:?}", other),
    }

    let rows = store.read(DEFAULT_TABLE).await.unwrap().rows;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("color"), Some(&CellValue::from("blue")));
}

#[tokio::test]
async fn no_search_results_stops_before_inference() {
    let (store, _dir) = catalog_with_color_column().await;
    let oracle = Arc::new(ScriptedOracle::new(red_answers(), true));
    let pipeline = orchestrator(store.clone(), false, oracle.clone());

    let outcome = pipeline
        .generate_entry("Acme", "Widget", DEFAULT_TABLE)
        .await;

    match outcome {
        EntryOutcome::Failed(e) => {
            assert_eq!(e.kind(), ErrorKind::NoResults);
            assert!(e.to_string().contains("Acme Widget specifications"));
        }
        other => panic!("expected no-results failure, got {:?}", other),
    }
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    assert!(store.read(DEFAULT_TABLE).await.unwrap().rows.is_empty());
}

#[tokio::test]
async fn table_listing_passes_through() {
    let (store, _dir) = catalog_with_color_column().await;
    let oracle = Arc::new(ScriptedOracle::new(red_answers(), true));
    let pipeline = orchestrator(store, true, oracle);

    let data = pipeline.get_table_data(DEFAULT_TABLE).await.unwrap();
    assert!(data.rows.is_empty());
    assert_eq!(
        data.columns,
        vec!["id", "supplier_name", "product_name", "creation_date", "color"]
    );

    let err = pipeline.get_table_data("missing_table").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
}
