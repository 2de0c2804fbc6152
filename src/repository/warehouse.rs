//! Data-warehouse catalog store over a REST SQL session.
//!
//! Logs in with user/password against `<account>.snowflakecomputing.com`
//! (or an explicit endpoint), then posts statements with positional bindings.
//! Unquoted identifiers are upper-cased by the warehouse, so column names are
//! lower-cased on the way back to line up with the relational backends.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use super::util::validate_identifier;
use super::{CatalogStore, Result, StoreError};
use crate::models::{CatalogRow, CellValue, TableData, SQL_TIMESTAMP_FORMAT};

/// Warehouse credentials and session scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Override for the account URL (tests, private links).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl WarehouseConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars: `SNOWFLAKE_ACCOUNT`, `SNOWFLAKE_USER`,
    /// `SNOWFLAKE_PASSWORD`, `SNOWFLAKE_WAREHOUSE`, `SNOWFLAKE_DATABASE`,
    /// `SNOWFLAKE_SCHEMA`, `SNOWFLAKE_ENDPOINT`.
    pub fn with_env_overrides(mut self) -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(v) = read("SNOWFLAKE_ACCOUNT") {
            self.account = Some(v);
        }
        if let Some(v) = read("SNOWFLAKE_USER") {
            self.user = Some(v);
        }
        if let Some(v) = read("SNOWFLAKE_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = read("SNOWFLAKE_WAREHOUSE") {
            self.warehouse = Some(v);
        }
        if let Some(v) = read("SNOWFLAKE_DATABASE") {
            self.database = Some(v);
        }
        if let Some(v) = read("SNOWFLAKE_SCHEMA") {
            self.schema = Some(v);
        }
        if let Some(v) = read("SNOWFLAKE_ENDPOINT") {
            self.endpoint = Some(v);
        }
        self
    }

    /// Names of the environment variables whose values are missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("SNOWFLAKE_USER", &self.user),
            ("SNOWFLAKE_PASSWORD", &self.password),
            ("SNOWFLAKE_ACCOUNT", &self.account),
            ("SNOWFLAKE_WAREHOUSE", &self.warehouse),
            ("SNOWFLAKE_DATABASE", &self.database),
            ("SNOWFLAKE_SCHEMA", &self.schema),
        ]
        .into_iter()
        .filter(|(_, v)| v.as_deref().map(str::is_empty).unwrap_or(true))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn base_url(&self) -> Option<String> {
        if let Some(endpoint) = &self.endpoint {
            return Some(endpoint.trim_end_matches('/').to_string());
        }
        self.account
            .as_ref()
            .map(|a| format!("https://{}.snowflakecomputing.com", a))
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    data: LoginRequestData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginRequestData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: &'a str,
    login_name: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding>,
}

#[derive(Debug, Serialize)]
struct Binding {
    #[serde(rename = "type")]
    kind: &'static str,
    value: Option<String>,
}

impl Binding {
    fn from_cell(value: &CellValue) -> Self {
        match value {
            CellValue::Null => Self {
                kind: "TEXT",
                value: None,
            },
            CellValue::Integer(n) => Self {
                kind: "FIXED",
                value: Some(n.to_string()),
            },
            CellValue::Float(f) => Self {
                kind: "REAL",
                value: Some(f.to_string()),
            },
            CellValue::Text(s) => Self {
                kind: "TEXT",
                value: Some(s.clone()),
            },
            CellValue::Timestamp(ts) => Self {
                kind: "TEXT",
                value: Some(ts.format(SQL_TIMESTAMP_FORMAT).to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(default)]
    rowtype: Vec<ColumnType>,
    /// First chunk of the result, inline.
    #[serde(default)]
    rowset: Vec<Vec<Option<String>>>,
    /// Remaining chunks, fetched separately.
    #[serde(default)]
    chunks: Vec<ChunkRef>,
    #[serde(default)]
    chunk_headers: BTreeMap<String, String>,
    /// Result master key, used when no explicit chunk headers are sent.
    #[serde(default)]
    qrmk: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkRef {
    url: String,
    #[serde(default)]
    row_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    scale: Option<i64>,
}

/// Error code for "object does not exist or not authorized".
const OBJECT_DOES_NOT_EXIST: &str = "002003";
/// Error code for an expired session token.
const SESSION_EXPIRED: &str = "390112";

/// Warehouse-backed catalog store holding one login session.
pub struct WarehouseCatalogStore {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
    sequence: std::sync::atomic::AtomicU64,
}

impl WarehouseCatalogStore {
    /// Log in and open a session.
    pub async fn connect(config: WarehouseConfig) -> Result<Self> {
        let missing = config.missing_fields();
        if !missing.is_empty() {
            let msg = format!(
                "Missing required warehouse credentials: {}",
                missing.join(", ")
            );
            error!("{}", msg);
            return Err(StoreError::Unavailable(msg));
        }
        info!("All required warehouse credentials are present");

        let base_url = config
            .base_url()
            .ok_or_else(|| StoreError::Unavailable("warehouse account not set".to_string()))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        // missing_fields() guarantees these are present
        let account = config.account.as_deref().unwrap_or_default();
        let user = config.user.as_deref().unwrap_or_default();
        let password = config.password.as_deref().unwrap_or_default();

        let body = LoginRequest {
            data: LoginRequestData {
                client_app_id: env!("CARGO_PKG_NAME"),
                client_app_version: env!("CARGO_PKG_VERSION"),
                account_name: account,
                login_name: user,
                password,
            },
        };

        let url = format!("{}/session/v1/login-request", base_url);
        let resp = client
            .post(&url)
            .query(&[
                ("warehouse", config.warehouse.as_deref().unwrap_or_default()),
                ("databaseName", config.database.as_deref().unwrap_or_default()),
                ("schemaName", config.schema.as_deref().unwrap_or_default()),
                ("request_id", &uuid::Uuid::new_v4().to_string()),
            ])
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("warehouse login failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("Failed to connect to warehouse: HTTP {}: {}", status, text);
            return Err(StoreError::Unavailable(format!(
                "warehouse login returned HTTP {}",
                status
            )));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid login response: {}", e)))?;

        let token = match (login.success, login.data.and_then(|d| d.token)) {
            (true, Some(token)) => token,
            _ => {
                let msg = login.message.unwrap_or_else(|| "login rejected".to_string());
                error!("Failed to connect to warehouse: {}", msg);
                return Err(StoreError::Unavailable(msg));
            }
        };

        info!("Connected to warehouse at {}", base_url);
        Ok(Self {
            client,
            base_url,
            token: RwLock::new(Some(token)),
            sequence: std::sync::atomic::AtomicU64::new(0),
        })
    }

    async fn session_token(&self) -> Result<String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Unavailable("warehouse session closed".to_string()))
    }

    async fn execute(&self, sql: &str, params: &[CellValue], table: &str) -> Result<QueryData> {
        let token = self.session_token().await?;
        let sequence_id = self
            .sequence
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            + 1;

        let bindings = params
            .iter()
            .enumerate()
            .map(|(i, v)| ((i + 1).to_string(), Binding::from_cell(v)))
            .collect();

        let request = QueryRequest {
            sql_text: sql,
            async_exec: false,
            sequence_id,
            bindings,
        };

        debug!("Warehouse statement: {}", sql);
        let url = format!("{}/queries/v1/query-request", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("requestId", uuid::Uuid::new_v4().to_string())])
            .header("Authorization", format!("Snowflake Token=\"{}\"", token))
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let msg = format!("HTTP {}: {}", status, text);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unavailable(msg),
                s if s.is_server_error() => StoreError::Unavailable(msg),
                _ => StoreError::Query(msg),
            });
        }

        let body: QueryResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Query(format!("invalid query response: {}", e)))?;

        if !body.success {
            let msg = body.message.unwrap_or_else(|| "statement failed".to_string());
            return Err(match body.code.as_deref() {
                Some(OBJECT_DOES_NOT_EXIST) => StoreError::TableNotFound(table.to_string()),
                Some(SESSION_EXPIRED) => StoreError::Unavailable(msg),
                _ => StoreError::Query(msg),
            });
        }

        let mut data = body.data.unwrap_or_default();
        self.fetch_chunks(&mut data).await?;
        Ok(data)
    }

    /// Append every remote result chunk to the inline rowset, in order.
    async fn fetch_chunks(&self, data: &mut QueryData) -> Result<()> {
        let chunks = std::mem::take(&mut data.chunks);
        if chunks.is_empty() {
            return Ok(());
        }
        debug!("Fetching {} result chunks", chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            let mut request = self.client.get(&chunk.url);
            if !data.chunk_headers.is_empty() {
                for (name, value) in &data.chunk_headers {
                    request = request.header(name.as_str(), value.as_str());
                }
            } else if let Some(qrmk) = &data.qrmk {
                request = request
                    .header("x-amz-server-side-encryption-customer-algorithm", "AES256")
                    .header("x-amz-server-side-encryption-customer-key", qrmk.as_str());
            }

            let resp = request.send().await.map_err(|e| {
                StoreError::Unavailable(format!("result chunk {} failed: {}", index, e))
            })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(StoreError::Query(format!(
                    "result chunk {} returned HTTP {}",
                    index, status
                )));
            }
            let body = resp.text().await.map_err(|e| {
                StoreError::Query(format!("failed to read result chunk {}: {}", index, e))
            })?;

            let rows = parse_chunk_rows(&body).map_err(|e| {
                StoreError::Query(format!("malformed result chunk {}: {}", index, e))
            })?;
            if let Some(expected) = chunk.row_count {
                if expected != rows.len() {
                    return Err(StoreError::Query(format!(
                        "result chunk {} has {} rows, expected {}",
                        index,
                        rows.len(),
                        expected
                    )));
                }
            }
            data.rowset.extend(rows);
        }
        Ok(())
    }
}

/// Chunk bodies are a comma-separated run of row arrays without the
/// enclosing brackets.
fn parse_chunk_rows(body: &str) -> serde_json::Result<Vec<Vec<Option<String>>>> {
    let trimmed = body.trim().trim_end_matches(',');
    if trimmed.starts_with("[[") || trimmed.is_empty() {
        let text = if trimmed.is_empty() { "[]" } else { trimmed };
        return serde_json::from_str(text);
    }
    serde_json::from_str(&format!("[{}]", trimmed))
}

fn cell_from_warehouse(raw: Option<&str>, column: &ColumnType) -> CellValue {
    let Some(raw) = raw else {
        return CellValue::Null;
    };

    let parsed = match column.kind.to_ascii_lowercase().as_str() {
        "fixed" if column.scale.unwrap_or(0) == 0 => raw.parse::<i64>().ok().map(CellValue::Integer),
        "fixed" | "real" => raw.parse::<f64>().ok().map(CellValue::Float),
        "timestamp_ntz" | "timestamp_ltz" | "timestamp_tz" => {
            parse_epoch_timestamp(raw).map(CellValue::Timestamp)
        }
        "date" => raw
            .parse::<i64>()
            .ok()
            .and_then(|days| {
                NaiveDate::from_ymd_opt(1970, 1, 1)?
                    .checked_add_signed(chrono::Duration::days(days))
            })
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(CellValue::Timestamp),
        _ => None,
    };

    parsed.unwrap_or_else(|| CellValue::Text(raw.to_string()))
}

/// Timestamps arrive as `"<seconds>.<nanos>"`, with a trailing offset for
/// zoned variants.
fn parse_epoch_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.split_whitespace().next()?;
    let (secs, frac) = value.split_once('.').unwrap_or((value, "0"));
    let secs: i64 = secs.parse().ok()?;
    let nanos: u32 = format!("{:0<9}", frac).get(..9)?.parse().ok()?;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

#[async_trait]
impl CatalogStore for WarehouseCatalogStore {
    fn backend_name(&self) -> &'static str {
        "warehouse"
    }

    async fn ensure_default_table(&self) -> Result<()> {
        debug!("Warehouse tables are provisioned externally");
        Ok(())
    }

    async fn read(&self, table: &str) -> Result<TableData> {
        validate_identifier(table)?;
        let sql = format!("SELECT * FROM {}", table);

        let result = self.execute(&sql, &[], table).await.map(|data| {
            let columns: Vec<String> = data
                .rowtype
                .iter()
                .map(|c| c.name.to_ascii_lowercase())
                .collect();
            let rows = data
                .rowset
                .iter()
                .map(|raw| {
                    columns
                        .iter()
                        .zip(&data.rowtype)
                        .enumerate()
                        .map(|(i, (name, ty))| {
                            let cell = raw.get(i).and_then(|v| v.as_deref());
                            (name.clone(), cell_from_warehouse(cell, ty))
                        })
                        .collect::<CatalogRow>()
                })
                .collect();
            TableData { columns, rows }
        });

        match &result {
            Ok(data) => debug!("Read {} rows from {}", data.rows.len(), table),
            Err(e) => error!("Error fetching data from table {}: {}", table, e),
        }
        result
    }

    async fn insert(&self, table: &str, row: &CatalogRow) -> Result<()> {
        validate_identifier(table)?;
        let mut columns = Vec::with_capacity(row.len());
        for column in row.columns() {
            validate_identifier(column)?;
            columns.push(column);
        }
        if columns.is_empty() {
            return Err(StoreError::Query(format!(
                "refusing to insert an empty row into {}",
                table
            )));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let params: Vec<CellValue> = row.iter().map(|(_, v)| v.clone()).collect();

        let result = self.execute(&sql, &params, table).await.map(|_| ());
        match &result {
            Ok(()) => info!("Inserted AI generated row into {}", table),
            Err(e) => error!("Error inserting data into table {}: {}", table, e),
        }
        result
    }

    async fn close(&self) -> Result<()> {
        let Some(token) = self.token.write().await.take() else {
            return Ok(());
        };

        let url = format!("{}/session", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("delete", "true")])
            .header("Authorization", format!("Snowflake Token=\"{}\"", token))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            error!("Warehouse session close returned HTTP {}", resp.status());
        }
        info!("Warehouse connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> WarehouseConfig {
        WarehouseConfig {
            account: Some("acct".to_string()),
            user: Some("loader".to_string()),
            password: Some("secret".to_string()),
            warehouse: Some("WH".to_string()),
            database: Some("CATALOG".to_string()),
            schema: Some("PUBLIC".to_string()),
            endpoint: Some(server.uri()),
        }
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/session/v1/login-request"))
            .and(body_partial_json(serde_json::json!({
                "data": {"LOGIN_NAME": "loader", "ACCOUNT_NAME": "acct"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"token": "tok-123"}
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn missing_fields_lists_env_names() {
        let config = WarehouseConfig {
            account: Some("acct".to_string()),
            ..Default::default()
        };
        let missing = config.missing_fields();
        assert!(missing.contains(&"SNOWFLAKE_USER"));
        assert!(missing.contains(&"SNOWFLAKE_PASSWORD"));
        assert!(!missing.contains(&"SNOWFLAKE_ACCOUNT"));
    }

    #[test]
    fn base_url_defaults_to_account_host() {
        let config = WarehouseConfig {
            account: Some("xy12345".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.base_url().as_deref(),
            Some("https://xy12345.snowflakecomputing.com")
        );
    }

    #[test]
    fn epoch_timestamps_parse() {
        let ts = parse_epoch_timestamp("1700000000.500000000").unwrap();
        assert_eq!(ts.and_utc().timestamp(), 1_700_000_000);
        assert_eq!(ts.and_utc().timestamp_subsec_millis(), 500);

        let zoned = parse_epoch_timestamp("1700000000.000000000 1440").unwrap();
        assert_eq!(zoned.and_utc().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn connect_without_credentials_is_unavailable() {
        let err = WarehouseCatalogStore::connect(WarehouseConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::Unavailable(msg) if msg.contains("SNOWFLAKE_USER")));
    }

    #[tokio::test]
    async fn read_maps_rowtype_and_lowercases_columns() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/queries/v1/query-request"))
            .and(header("Authorization", "Snowflake Token=\"tok-123\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "rowtype": [
                        {"name": "ID", "type": "fixed", "scale": 0},
                        {"name": "SUPPLIER_NAME", "type": "text"},
                        {"name": "PRODUCT_NAME", "type": "text"},
                        {"name": "CREATION_DATE", "type": "timestamp_ntz"},
                        {"name": "PRICE", "type": "fixed", "scale": 2}
                    ],
                    "rowset": [["1", "Acme", "Widget", "1700000000.000000000", null]]
                }
            })))
            .mount(&server)
            .await;

        let store = WarehouseCatalogStore::connect(config_for(&server)).await.unwrap();
        let data = store.read("supplier_products").await.unwrap();

        assert_eq!(
            data.columns,
            vec!["id", "supplier_name", "product_name", "creation_date", "price"]
        );
        let row = &data.rows[0];
        assert_eq!(row.get("id"), Some(&CellValue::Integer(1)));
        assert_eq!(row.identity(), Some(("Acme", "Widget")));
        assert!(matches!(row.get("creation_date"), Some(CellValue::Timestamp(_))));
        assert_eq!(row.get("price"), Some(&CellValue::Null));
    }

    #[test]
    fn chunk_bodies_parse_with_or_without_brackets() {
        let rows = parse_chunk_rows("[\"1\",\"a\"],\n[\"2\",null]").unwrap();
        assert_eq!(rows, vec![
            vec![Some("1".to_string()), Some("a".to_string())],
            vec![Some("2".to_string()), None],
        ]);
        assert_eq!(parse_chunk_rows("[[\"1\"]]").unwrap().len(), 1);
        assert!(parse_chunk_rows("  ").unwrap().is_empty());
        assert!(parse_chunk_rows("{").is_err());
    }

    #[tokio::test]
    async fn read_follows_result_chunks() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/queries/v1/query-request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "rowtype": [
                        {"name": "SUPPLIER_NAME", "type": "text"},
                        {"name": "PRODUCT_NAME", "type": "text"}
                    ],
                    "rowset": [["Acme", "Widget"]],
                    "chunks": [
                        {"url": format!("{}/results/chunk-0", server.uri()), "rowCount": 2},
                        {"url": format!("{}/results/chunk-1", server.uri()), "rowCount": 1}
                    ],
                    "chunkHeaders": {"x-amz-server-side-encryption-customer-key": "key-1"}
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/results/chunk-0"))
            .and(header("x-amz-server-side-encryption-customer-key", "key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "[\"Globex\",\"Widget\"],\n[\"Initech\",\"Stapler\"]",
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/results/chunk-1"))
            .and(header("x-amz-server-side-encryption-customer-key", "key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[\"Umbrella\",\"Gadget\"]"))
            .expect(1)
            .mount(&server)
            .await;

        let store = WarehouseCatalogStore::connect(config_for(&server)).await.unwrap();
        let data = store.read("supplier_products").await.unwrap();

        let suppliers: Vec<&str> = data
            .rows
            .iter()
            .filter_map(|r| r.identity().map(|(s, _)| s))
            .collect();
        assert_eq!(suppliers, vec!["Acme", "Globex", "Initech", "Umbrella"]);
    }

    #[tokio::test]
    async fn short_result_chunk_is_an_error() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/queries/v1/query-request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "rowtype": [{"name": "SUPPLIER_NAME", "type": "text"}],
                    "rowset": [["Acme"]],
                    "chunks": [{"url": format!("{}/results/chunk-0", server.uri()), "rowCount": 3}],
                    "qrmk": "master-key"
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/results/chunk-0"))
            .and(header("x-amz-server-side-encryption-customer-key", "master-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[\"Globex\"]"))
            .mount(&server)
            .await;

        let store = WarehouseCatalogStore::connect(config_for(&server)).await.unwrap();
        let err = store.read("supplier_products").await.unwrap_err();
        assert!(matches!(err, StoreError::Query(msg) if msg.contains("expected 3")));
    }

    #[tokio::test]
    async fn insert_sends_positional_bindings() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/queries/v1/query-request"))
            .and(body_partial_json(serde_json::json!({
                "sqlText": "INSERT INTO supplier_products (supplier_name, product_name, color) VALUES (?, ?, ?)",
                "bindings": {
                    "1": {"type": "TEXT", "value": "Acme"},
                    "3": {"type": "TEXT", "value": "red [AI generated]"}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"rowtype": [], "rowset": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = WarehouseCatalogStore::connect(config_for(&server)).await.unwrap();
        let mut row = CatalogRow::with_identity("Acme", "Widget");
        row.insert("color", "red [AI generated]");
        store.insert("supplier_products", &row).await.unwrap();
    }

    #[tokio::test]
    async fn missing_object_maps_to_table_not_found() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/queries/v1/query-request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "code": "002003",
                "message": "Object 'NOPE' does not exist or not authorized."
            })))
            .mount(&server)
            .await;

        let store = WarehouseCatalogStore::connect(config_for(&server)).await.unwrap();
        let err = store.read("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::TableNotFound(t) if t == "nope"));
    }

    #[tokio::test]
    async fn closed_session_is_unavailable() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = WarehouseCatalogStore::connect(config_for(&server)).await.unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap();

        let err = store.read("supplier_products").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
