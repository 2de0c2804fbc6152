//! HTTP API for catalog enrichment.
//!
//! Thin JSON surface over the [`Orchestrator`]:
//! - `GET /` and `GET /api/health` for liveness
//! - `GET /api/data/:table_name` to list a table
//! - `POST /api/generate-entry` to run the pipeline for one supplier/product

mod handlers;
mod routes;

pub use routes::create_router;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::Settings;
use crate::llm::LlmClient;
use crate::repository::CatalogStore;
use crate::scrapers::WebRetriever;
use crate::services::Orchestrator;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Table used when a generate request names none.
    pub default_table: String,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, default_table: impl Into<String>) -> Self {
        Self {
            orchestrator,
            default_table: default_table.into(),
        }
    }
}

/// Wire an opened store to the configured web retriever and LLM client.
pub fn build_orchestrator(
    settings: &Settings,
    store: Arc<dyn CatalogStore>,
) -> anyhow::Result<Orchestrator> {
    let retriever = WebRetriever::from_settings(settings)?;
    let oracle = LlmClient::new(settings.llm.clone())?;
    Ok(Orchestrator::new(store, Arc::new(retriever), Arc::new(oracle)))
}

/// Start the web server on an opened store; runs until Ctrl+C, then closes
/// the store.
pub async fn serve(
    settings: &Settings,
    store: Arc<dyn CatalogStore>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    serve_until(settings, store, host, port, shutdown_signal()).await
}

async fn serve_until<F>(
    settings: &Settings,
    store: Arc<dyn CatalogStore>,
    host: &str,
    port: u16,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let served = async {
        let orchestrator = build_orchestrator(settings, store.clone())?;
        let app = create_router(AppState::new(Arc::new(orchestrator), &settings.default_table));

        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Starting server at http://{}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok::<(), anyhow::Error>(())
    }
    .await;

    info!("Server stopped, closing catalog store");
    let closed = store.close().await;
    served?;
    closed?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::llm::{AiResponses, InferenceOracle, LlmError};
    use crate::models::{
        CatalogRow, FieldValidation, ScrapedContent, TableData, ValidationResult, DEFAULT_TABLE,
    };
    use crate::repository::SqliteCatalogStore;
    use crate::scrapers::{ContentRetriever, RetrievalError};

    struct FixedRetriever {
        found: bool,
    }

    #[async_trait]
    impl ContentRetriever for FixedRetriever {
        async fn fetch(&self, _url: &str) -> Result<String, RetrievalError> {
            Ok("Color: red".to_string())
        }

        async fn search(
            &self,
            supplier: &str,
            product: &str,
        ) -> Result<ScrapedContent, RetrievalError> {
            if !self.found {
                return Err(RetrievalError::NoResults {
                    query: format!("{} {} specifications", supplier, product),
                });
            }
            Ok(ScrapedContent::new("https://acme.example/widget", "Color: red"))
        }
    }

    struct FixedOracle {
        approve: bool,
    }

    #[async_trait]
    impl InferenceOracle for FixedOracle {
        async fn generate(
            &self,
            _existing: &[CatalogRow],
            _content: &str,
            _questions: &[String],
        ) -> Result<AiResponses, LlmError> {
            Ok(AiResponses::new())
        }

        async fn validate(
            &self,
            _responses: &AiResponses,
            _questions: &[String],
        ) -> Result<ValidationResult, LlmError> {
            let mut result = ValidationResult {
                is_valid: self.approve,
                validation_details: Default::default(),
            };
            if !self.approve {
                result.validation_details.insert(
                    "supplier_name".to_string(),
                    FieldValidation {
                        valid: false,
                        issues: vec!["not supported by content".to_string()],
                    },
                );
            }
            Ok(result)
        }
    }

    #[derive(Default)]
    struct CountingStore {
        closed: AtomicUsize,
    }

    #[async_trait]
    impl CatalogStore for CountingStore {
        fn backend_name(&self) -> &'static str {
            "counting"
        }

        async fn ensure_default_table(&self) -> crate::repository::Result<()> {
            Ok(())
        }

        async fn read(&self, _table: &str) -> crate::repository::Result<TableData> {
            Ok(TableData::default())
        }

        async fn insert(&self, _table: &str, _row: &CatalogRow) -> crate::repository::Result<()> {
            Ok(())
        }

        async fn close(&self) -> crate::repository::Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_closes_store_once() {
        let store = Arc::new(CountingStore::default());
        let settings = Settings::default();

        serve_until(&settings, store.clone(), "127.0.0.1", 0, async {})
            .await
            .unwrap();

        assert_eq!(store.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bind_failure_still_closes_store() {
        let store = Arc::new(CountingStore::default());
        let settings = Settings::default();

        let result = serve_until(&settings, store.clone(), "not a host", 0, async {}).await;

        assert!(result.is_err());
        assert_eq!(store.closed.load(Ordering::SeqCst), 1);
    }

    async fn setup_test_app(found: bool, approve: bool) -> (axum::Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteCatalogStore::from_path(&dir.path().join("test.db"));
        store.ensure_default_table().await.unwrap();

        let orchestrator = Orchestrator::new(
            Arc::new(store),
            Arc::new(FixedRetriever { found }),
            Arc::new(FixedOracle { approve }),
        );
        let app = create_router(AppState::new(Arc::new(orchestrator), DEFAULT_TABLE));
        (app, dir)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn generate_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate-entry")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let (app, _dir) = setup_test_app(true, true).await;

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["message"], "catalog-enrich server is running");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _dir) = setup_test_app(true, true).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn test_table_data_empty() {
        let (app, _dir) = setup_test_app(true, true).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/data/supplier_products")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "success", "data": []})
        );
    }

    #[tokio::test]
    async fn test_table_data_missing_table() {
        let (app, _dir) = setup_test_app(true, true).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/data/no_such_table")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "store");
    }

    #[tokio::test]
    async fn test_generate_entry_persists_and_lists() {
        let (app, _dir) = setup_test_app(true, true).await;

        let response = app
            .clone()
            .oneshot(generate_request(
                json!({"supplier_name": "Acme", "product_name": "Widget"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["source_url"], "https://acme.example/widget");
        assert_eq!(body["row"]["supplier_name"], "Acme");
        assert_eq!(body["row"]["product_name"], "Widget");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/data/supplier_products")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["supplier_name"], "Acme");
    }

    #[tokio::test]
    async fn test_generate_entry_duplicate_is_conflict() {
        let (app, _dir) = setup_test_app(true, true).await;
        let request = json!({"supplier_name": "Acme", "product_name": "Widget"});

        let first = app
            .clone()
            .oneshot(generate_request(request.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(generate_request(request)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body = body_json(second).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "duplicate");
    }

    #[tokio::test]
    async fn test_generate_entry_rejected_by_review() {
        let (app, _dir) = setup_test_app(true, false).await;

        let response = app
            .oneshot(generate_request(
                json!({"supplier_name": "Acme", "product_name": "Widget"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Generated data failed validation");
        assert_eq!(body["validation_details"]["is_valid"], false);
        assert_eq!(
            body["validation_details"]["validation_details"]["supplier_name"]["valid"],
            false
        );
    }

    #[tokio::test]
    async fn test_generate_entry_no_results() {
        let (app, _dir) = setup_test_app(false, true).await;

        let response = app
            .oneshot(generate_request(json!({
                "supplier_name": "Acme",
                "product_name": "Widget",
                "table_name": "supplier_products"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "no_results");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Acme Widget specifications"));
    }

    #[tokio::test]
    async fn test_generate_entry_rejects_missing_fields() {
        let (app, _dir) = setup_test_app(true, true).await;

        let response = app
            .oneshot(generate_request(json!({"supplier_name": "Acme"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "format");
        assert!(body["message"].as_str().unwrap().contains("product_name"));
    }

    #[tokio::test]
    async fn test_generate_entry_rejects_malformed_json() {
        let (app, _dir) = setup_test_app(true, true).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/generate-entry")
            .header("content-type", "application/json")
            .body(Body::from("{\"supplier_name\": "))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "format");
    }
}
