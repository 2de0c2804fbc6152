//! Catalog row models.
//!
//! Catalog tables are open-ended: beyond the identity columns their shape is
//! discovered from the store at runtime, so rows are ordered column maps of
//! tagged scalars rather than structs.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column holding the supplier half of the row identity.
pub const SUPPLIER_NAME: &str = "supplier_name";
/// Column holding the product half of the row identity.
pub const PRODUCT_NAME: &str = "product_name";
/// Server-assigned creation timestamp column.
pub const CREATION_DATE: &str = "creation_date";
/// Surrogate key column.
pub const ID: &str = "id";

/// Name of the table provisioned on startup.
pub const DEFAULT_TABLE: &str = "supplier_products";

/// Timestamp format used by SQL `CURRENT_TIMESTAMP`.
pub const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Parse a SQL timestamp literal, accepting both `T` and space separators
    /// and optional fractional seconds.
    pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(ts: NaiveDateTime) -> Self {
        Self::Timestamp(ts)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
            Self::Timestamp(ts) => write!(f, "{}", ts.format(SQL_TIMESTAMP_FORMAT)),
        }
    }
}

/// An ordered mapping from column name to cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogRow(IndexMap<String, CellValue>);

impl CatalogRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the identity part of a new row.
    pub fn with_identity(supplier_name: &str, product_name: &str) -> Self {
        let mut row = Self::new();
        row.insert(SUPPLIER_NAME, supplier_name);
        row.insert(PRODUCT_NAME, product_name);
        row
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<CellValue> {
        self.0.shift_remove(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut CellValue)> {
        self.0.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// The `(supplier_name, product_name)` pair when both are text.
    pub fn identity(&self) -> Option<(&str, &str)> {
        let supplier = self.get(SUPPLIER_NAME)?.as_str()?;
        let product = self.get(PRODUCT_NAME)?.as_str()?;
        Some((supplier, product))
    }
}

impl FromIterator<(String, CellValue)> for CatalogRow {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for CatalogRow {
    type Item = (String, CellValue);
    type IntoIter = indexmap::map::IntoIter<String, CellValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Result of a full table scan: column names from the result-set metadata
/// plus the rows themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<CatalogRow>,
}

impl TableData {
    /// Column names, used as the question set for inference.
    pub fn question_fields(&self) -> &[String] {
        &self.columns
    }
}
