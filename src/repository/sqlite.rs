//! SQLite-backed catalog store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, ErrorCode, OpenFlags};
use tracing::{debug, error, info};

use super::util::{insert_sql, select_all_sql, Placeholder};
use super::{CatalogStore, Result, StoreError};
use crate::models::{
    CatalogRow, CellValue, TableData, DEFAULT_TABLE, PRODUCT_NAME, SQL_TIMESTAMP_FORMAT,
    SUPPLIER_NAME,
};

const CREATE_DEFAULT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS supplier_products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier_name TEXT NOT NULL,
    product_name TEXT NOT NULL,
    creation_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(supplier_name, product_name)
)
"#;

/// SQLite catalog store. Opens a connection per call.
pub struct SqliteCatalogStore {
    db_path: PathBuf,
}

impl SqliteCatalogStore {
    /// Create a store from a file path or `sqlite:` URL.
    pub fn new(database_url: &str) -> Self {
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        let expanded = shellexpand::tilde(path);
        Self {
            db_path: PathBuf::from(expanded.as_ref()),
        }
    }

    /// Create a store from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self {
            db_path: path.to_path_buf(),
        }
    }

    /// Get the database path.
    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` on a fresh connection off the async runtime.
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = connect(&path)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Query(format!("store task failed: {}", e)))?
    }
}

fn connect(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

fn map_sqlite_error(e: rusqlite::Error, table: &str) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg) => {
            let missing_table = msg
                .as_deref()
                .map(|m| m.contains("no such table"))
                .unwrap_or(false);
            if missing_table {
                StoreError::TableNotFound(table.to_string())
            } else if matches!(
                err.code,
                ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::DatabaseBusy
            ) {
                StoreError::Unavailable(e.to_string())
            } else {
                StoreError::Query(e.to_string())
            }
        }
        _ => StoreError::Query(e.to_string()),
    }
}

fn is_timestamp_decl(decl: Option<&str>) -> bool {
    decl.map(|d| {
        let d = d.to_ascii_uppercase();
        d.contains("TIMESTAMP") || d.contains("DATETIME")
    })
    .unwrap_or(false)
}

fn cell_from_sqlite(value: ValueRef<'_>, decl: Option<&str>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(n) => CellValue::Integer(n),
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if is_timestamp_decl(decl) {
                if let Some(ts) = CellValue::parse_timestamp(&text) {
                    return CellValue::Timestamp(ts);
                }
            }
            CellValue::Text(text)
        }
        ValueRef::Blob(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn cell_to_sqlite(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::Null,
        CellValue::Integer(n) => Value::Integer(*n),
        CellValue::Float(f) => Value::Real(*f),
        CellValue::Text(s) => Value::Text(s.clone()),
        CellValue::Timestamp(ts) => Value::Text(ts.format(SQL_TIMESTAMP_FORMAT).to_string()),
    }
}

fn read_table(conn: &Connection, table: &str) -> Result<TableData> {
    let sql = select_all_sql(table)?;
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| map_sqlite_error(e, table))?;

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let decl_types: Vec<Option<String>> = stmt
        .columns()
        .iter()
        .map(|c| c.decl_type().map(String::from))
        .collect();

    let mut result = stmt.query([]).map_err(|e| map_sqlite_error(e, table))?;
    let mut rows = Vec::new();
    while let Some(row) = result.next().map_err(|e| map_sqlite_error(e, table))? {
        let mut catalog_row = CatalogRow::new();
        for (i, name) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(|e| map_sqlite_error(e, table))?;
            catalog_row.insert(name.clone(), cell_from_sqlite(value, decl_types[i].as_deref()));
        }
        rows.push(catalog_row);
    }

    Ok(TableData { columns, rows })
}

fn insert_row(conn: &Connection, table: &str, row: &CatalogRow) -> Result<()> {
    let sql = insert_sql(table, row.columns(), Placeholder::Question)?;
    let values: Vec<Value> = row.iter().map(|(_, v)| cell_to_sqlite(v)).collect();

    match conn.execute(&sql, rusqlite::params_from_iter(values.iter())) {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(StoreError::UniqueViolation {
            supplier: row.get(SUPPLIER_NAME).map(|v| v.to_string()).unwrap_or_default(),
            product: row.get(PRODUCT_NAME).map(|v| v.to_string()).unwrap_or_default(),
        }),
        Err(e) => Err(map_sqlite_error(e, table)),
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn ensure_default_table(&self) -> Result<()> {
        let result = self
            .with_connection(|conn| {
                conn.execute_batch(CREATE_DEFAULT_TABLE)
                    .map_err(|e| map_sqlite_error(e, DEFAULT_TABLE))
            })
            .await;

        match &result {
            Ok(()) => info!("Table {} created/verified", DEFAULT_TABLE),
            Err(e) => error!("Error creating table {}: {}", DEFAULT_TABLE, e),
        }
        result
    }

    async fn read(&self, table: &str) -> Result<TableData> {
        let owned = table.to_string();
        let result = self
            .with_connection(move |conn| read_table(conn, &owned))
            .await;

        match &result {
            Ok(data) => debug!("Read {} rows from {}", data.rows.len(), table),
            Err(e) => error!("Error fetching data from table {}: {}", table, e),
        }
        result
    }

    async fn insert(&self, table: &str, row: &CatalogRow) -> Result<()> {
        let owned = table.to_string();
        let row = row.clone();
        let result = self
            .with_connection(move |conn| insert_row(conn, &owned, &row))
            .await;

        match &result {
            Ok(()) => info!("Inserted AI generated row into {}", table),
            Err(e) => error!("Error inserting data into table {}: {}", table, e),
        }
        result
    }
}
