//! PostgreSQL-backed catalog store.

use std::error::Error;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, Row};
use tracing::{debug, error, info};

use super::pg_tls::connect_raw;
use super::util::{
    insert_sql, pg_error_message, quote_ident, redact_url_password, validate_identifier,
    Placeholder,
};
use super::{CatalogStore, Result, StoreError};
use crate::models::{CatalogRow, CellValue, TableData, DEFAULT_TABLE, PRODUCT_NAME, SUPPLIER_NAME};

const CREATE_DEFAULT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS supplier_products (
    id SERIAL PRIMARY KEY,
    supplier_name VARCHAR(255) NOT NULL,
    product_name VARCHAR(255) NOT NULL,
    creation_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(supplier_name, product_name)
)
"#;

/// PostgreSQL catalog store over a single shared client.
pub struct PostgresCatalogStore {
    client: Client,
}

impl PostgresCatalogStore {
    pub async fn connect(url: &str, no_tls: bool) -> Result<Self> {
        let client = connect_raw(url, no_tls).await.map_err(|e| {
            let msg = pg_error_message(&e);
            error!(
                "Failed to connect to database {}: {}",
                redact_url_password(url),
                msg
            );
            StoreError::Unavailable(msg)
        })?;
        info!("Connected to PostgreSQL at {}", redact_url_password(url));
        Ok(Self { client })
    }

    fn check_open(&self) -> Result<()> {
        if self.client.is_closed() {
            return Err(StoreError::Unavailable(
                "PostgreSQL connection closed".to_string(),
            ));
        }
        Ok(())
    }
}

fn map_pg_error(e: tokio_postgres::Error, table: &str) -> StoreError {
    if e.is_closed() {
        return StoreError::Unavailable(pg_error_message(&e));
    }
    match e.code() {
        Some(code) if *code == SqlState::UNDEFINED_TABLE => {
            StoreError::TableNotFound(table.to_string())
        }
        _ => StoreError::Query(pg_error_message(&e)),
    }
}

/// Column types read directly; everything else is selected as `::text`.
fn is_native_type(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::BOOL
            | Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::TEXT
            | Type::VARCHAR
            | Type::BPCHAR
            | Type::NAME
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ
    )
}

fn is_textual(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME)
}

fn cell_from_pg(row: &Row, idx: usize) -> std::result::Result<CellValue, tokio_postgres::Error> {
    let ty = row.columns()[idx].type_().clone();
    let value = match ty {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)?
            .map(|b| CellValue::Text(b.to_string())),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|n| CellValue::Integer(n.into())),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|n| CellValue::Integer(n.into())),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(CellValue::Integer),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|n| CellValue::Float(n.into())),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(CellValue::Float),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(CellValue::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|ts| CellValue::Timestamp(ts.naive_utc())),
        _ => row.try_get::<_, Option<String>>(idx)?.map(CellValue::Text),
    };
    Ok(value.unwrap_or(CellValue::Null))
}

/// Binds a [`CellValue`] to whatever column type the server expects.
#[derive(Debug)]
struct PgCell<'a>(&'a CellValue);

impl ToSql for PgCell<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.0 {
            CellValue::Null => Ok(IsNull::Yes),
            CellValue::Integer(n) => match *ty {
                Type::INT2 => i16::try_from(*n)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*n)?.to_sql(ty, out),
                Type::FLOAT4 => (*n as f32).to_sql(ty, out),
                Type::FLOAT8 => (*n as f64).to_sql(ty, out),
                ref t if is_textual(t) => n.to_string().to_sql(ty, out),
                _ => n.to_sql(ty, out),
            },
            CellValue::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                ref t if is_textual(t) => f.to_string().to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            CellValue::Text(s) => match *ty {
                ref t if is_textual(t) => s.as_str().to_sql(ty, out),
                Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
                Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
                Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
                Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
                Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
                Type::BOOL => s.trim().parse::<bool>()?.to_sql(ty, out),
                _ => Err(format!("cannot bind text to column of type {}", ty).into()),
            },
            CellValue::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                ref t if is_textual(t) => ts.to_string().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_default_table(&self) -> Result<()> {
        self.check_open()?;
        match self.client.batch_execute(CREATE_DEFAULT_TABLE).await {
            Ok(()) => {
                info!("Table {} created/verified", DEFAULT_TABLE);
                Ok(())
            }
            Err(e) => {
                let err = map_pg_error(e, DEFAULT_TABLE);
                error!("Error creating table {}: {}", DEFAULT_TABLE, err);
                Err(err)
            }
        }
    }

    async fn read(&self, table: &str) -> Result<TableData> {
        self.check_open()?;
        validate_identifier(table)?;

        let result: Result<TableData> = async {
            // Probe the column list first so exotic types can be cast to text.
            let probe = self
                .client
                .prepare(&format!("SELECT * FROM {}", quote_ident(table)))
                .await
                .map_err(|e| map_pg_error(e, table))?;

            let columns: Vec<String> = probe.columns().iter().map(|c| c.name().to_string()).collect();
            let select_list: Vec<String> = probe
                .columns()
                .iter()
                .map(|c| {
                    if is_native_type(c.type_()) {
                        quote_ident(c.name())
                    } else {
                        format!("{}::text AS {}", quote_ident(c.name()), quote_ident(c.name()))
                    }
                })
                .collect();

            if columns.is_empty() {
                return Ok(TableData::default());
            }

            let sql = format!("SELECT {} FROM {}", select_list.join(", "), quote_ident(table));
            let rows = self
                .client
                .query(sql.as_str(), &[])
                .await
                .map_err(|e| map_pg_error(e, table))?;

            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                let mut catalog_row = CatalogRow::new();
                for (i, name) in columns.iter().enumerate() {
                    let value = cell_from_pg(row, i).map_err(|e| map_pg_error(e, table))?;
                    catalog_row.insert(name.clone(), value);
                }
                out.push(catalog_row);
            }

            Ok(TableData { columns, rows: out })
        }
        .await;

        match &result {
            Ok(data) => debug!("Read {} rows from {}", data.rows.len(), table),
            Err(e) => error!("Error fetching data from table {}: {}", table, e),
        }
        result
    }

    async fn insert(&self, table: &str, row: &CatalogRow) -> Result<()> {
        self.check_open()?;
        let sql = insert_sql(table, row.columns(), Placeholder::Dollar)?;
        let cells: Vec<PgCell<'_>> = row.iter().map(|(_, v)| PgCell(v)).collect();
        let params: Vec<&(dyn ToSql + Sync)> =
            cells.iter().map(|c| c as &(dyn ToSql + Sync)).collect();

        match self.client.execute(sql.as_str(), &params).await {
            Ok(_) => {
                info!("Inserted AI generated row into {}", table);
                Ok(())
            }
            Err(e) => {
                let err = if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    StoreError::UniqueViolation {
                        supplier: row.get(SUPPLIER_NAME).map(|v| v.to_string()).unwrap_or_default(),
                        product: row.get(PRODUCT_NAME).map(|v| v.to_string()).unwrap_or_default(),
                    }
                } else {
                    map_pg_error(e, table)
                };
                error!("Error inserting data into table {}: {}", table, err);
                Err(err)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        debug!("PostgreSQL client released");
        Ok(())
    }
}
