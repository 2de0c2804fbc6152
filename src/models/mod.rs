//! Data models for catalog enrichment.

mod content;
mod review;
mod row;

pub use content::ScrapedContent;
pub use review::{FieldValidation, ValidationResult};
pub use row::{
    CatalogRow, CellValue, TableData, CREATION_DATE, DEFAULT_TABLE, ID, PRODUCT_NAME,
    SQL_TIMESTAMP_FORMAT, SUPPLIER_NAME,
};
