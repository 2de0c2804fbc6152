//! Catalog store: reads and appends rows of named catalog tables.
//!
//! Three backends share the [`CatalogStore`] contract:
//! - SQLite (default, file path or `sqlite:` URL)
//! - PostgreSQL (`postgres://` URL, behind the `postgres` feature)
//! - a REST-session data warehouse selected with `store_backend = "warehouse"`

pub mod sqlite;
pub mod util;
pub mod warehouse;

#[cfg(feature = "postgres")]
pub mod pg_tls;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Settings, StoreBackend};
use crate::models::{CatalogRow, TableData};

pub use sqlite::SqliteCatalogStore;
pub use warehouse::WarehouseCatalogStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresCatalogStore;

/// Errors raised by catalog stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Catalog store unavailable: {0}")]
    Unavailable(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Duplicate entry for supplier '{supplier}' and product '{product}'")]
    UniqueViolation { supplier: String, product: String },

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Query failed: {0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Contract shared by every catalog backend.
///
/// Each call is its own transaction: a `read` followed by an `insert` is not
/// atomic, and the table's uniqueness constraint is the final arbiter for
/// concurrent duplicate inserts.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Short backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Create the default `supplier_products` table if it does not exist.
    /// Safe to call on every startup.
    async fn ensure_default_table(&self) -> Result<()>;

    /// Unconditional full-table scan.
    async fn read(&self, table: &str) -> Result<TableData>;

    /// Insert one row covering exactly the columns present in `row`.
    async fn insert(&self, table: &str, row: &CatalogRow) -> Result<()>;

    /// Release backend resources.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the store configured in `settings` and provision the default table.
pub async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn CatalogStore>> {
    let store: Arc<dyn CatalogStore> = match settings.store_backend {
        StoreBackend::Warehouse => {
            let store = WarehouseCatalogStore::connect(settings.warehouse.clone()).await?;
            Arc::new(store)
        }
        StoreBackend::Relational => open_relational(settings).await?,
    };

    store.ensure_default_table().await?;
    info!("Catalog store ready ({})", store.backend_name());
    Ok(store)
}

async fn open_relational(settings: &Settings) -> anyhow::Result<Arc<dyn CatalogStore>> {
    let url = settings.database_url();

    if util::is_postgres_url(&url) {
        #[cfg(feature = "postgres")]
        {
            let store = PostgresCatalogStore::connect(&url, settings.no_tls).await?;
            return Ok(Arc::new(store));
        }
        #[cfg(not(feature = "postgres"))]
        {
            anyhow::bail!(
                "PostgreSQL URL {} requires building with the `postgres` feature",
                util::redact_url_password(&url)
            );
        }
    }

    Ok(Arc::new(SqliteCatalogStore::new(&url)))
}
