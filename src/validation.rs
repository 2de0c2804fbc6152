//! Row validation before persistence: required fields, identity types,
//! provenance tagging and supplier/product uniqueness.

use tracing::{debug, error};

use crate::models::{CatalogRow, CellValue, CREATION_DATE, PRODUCT_NAME, SUPPLIER_NAME};

/// Marker appended to model-generated text values.
pub const PROVENANCE_TAG: &str = "[AI generated]";

/// Columns every row must carry before it is persisted.
pub const REQUIRED_FIELDS: &[&str] = &[SUPPLIER_NAME, PRODUCT_NAME, CREATION_DATE];

/// Row-level validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Field '{field}' must be a string")]
    WrongType { field: String },

    #[error("Entry already exists for supplier '{supplier}' and product '{product}'")]
    Duplicate { supplier: String, product: String },
}

impl ValidationError {
    /// True for the duplicate-entry failure, false for format failures.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Append the provenance tag unless the value already ends with it.
pub fn tag_value(value: &str) -> String {
    if value.ends_with(PROVENANCE_TAG) {
        value.to_string()
    } else {
        format!("{} {}", value, PROVENANCE_TAG)
    }
}

/// Stateless validator applied to every new row.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowValidator;

impl RowValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check required fields and identity types, then tag generated text.
    ///
    /// Identity columns are caller-supplied and left untagged. Tagging is
    /// idempotent, so running this twice leaves the row unchanged.
    pub fn check_format(&self, row: &mut CatalogRow) -> Result<(), ValidationError> {
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !row.contains(f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            let err = ValidationError::MissingFields(missing);
            error!("Format validation failed: {}", err);
            return Err(err);
        }

        for field in [SUPPLIER_NAME, PRODUCT_NAME] {
            if !row.get(field).is_some_and(CellValue::is_text) {
                let err = ValidationError::WrongType {
                    field: field.to_string(),
                };
                error!("Format validation failed: {}", err);
                return Err(err);
            }
        }

        for (column, value) in row.iter_mut() {
            if column == SUPPLIER_NAME || column == PRODUCT_NAME {
                continue;
            }
            if let CellValue::Text(text) = value {
                *text = tag_value(text);
            }
        }
        debug!("Row passed format validation");
        Ok(())
    }

    /// Reject a row whose supplier/product pair is already present.
    pub fn check_uniqueness(
        &self,
        new_row: &CatalogRow,
        existing_rows: &[CatalogRow],
    ) -> Result<(), ValidationError> {
        let Some((supplier, product)) = new_row.identity() else {
            return Err(ValidationError::MissingFields(vec![
                SUPPLIER_NAME.to_string(),
                PRODUCT_NAME.to_string(),
            ]));
        };

        if existing_rows
            .iter()
            .any(|row| row.identity() == Some((supplier, product)))
        {
            let err = ValidationError::Duplicate {
                supplier: supplier.to_string(),
                product: product.to_string(),
            };
            error!("Uniqueness validation failed: {}", err);
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn complete_row() -> CatalogRow {
        let mut row = CatalogRow::with_identity("Acme", "Widget");
        let ts = NaiveDate::from_ymd_opt(2026, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        row.insert(CREATION_DATE, ts);
        row
    }

    #[test]
    fn tagging_is_idempotent() {
        assert_eq!(tag_value("red"), "red [AI generated]");
        assert_eq!(tag_value("red [AI generated]"), "red [AI generated]");
        assert_eq!(tag_value(&tag_value("red")), tag_value("red"));
        assert_eq!(tag_value(""), " [AI generated]");
    }

    #[test]
    fn missing_required_fields_are_listed() {
        let validator = RowValidator::new();
        for missing in REQUIRED_FIELDS {
            let mut row = complete_row();
            row.remove(missing);
            let err = validator.check_format(&mut row).unwrap_err();
            assert_eq!(err, ValidationError::MissingFields(vec![missing.to_string()]));
        }

        let mut empty = CatalogRow::new();
        let err = validator.check_format(&mut empty).unwrap_err();
        assert!(matches!(err, ValidationError::MissingFields(f) if f.len() == 3));
    }

    #[test]
    fn identity_fields_must_be_text() {
        let mut row = complete_row();
        row.insert(PRODUCT_NAME, 42_i64);
        let err = RowValidator::new().check_format(&mut row).unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongType {
                field: PRODUCT_NAME.to_string()
            }
        );
    }

    #[test]
    fn only_generated_text_is_tagged() {
        let mut row = complete_row();
        row.insert("color", "red");
        row.insert("weight_kg", 2.5);
        row.insert("notes", "checked [AI generated]");

        let validator = RowValidator::new();
        validator.check_format(&mut row).unwrap();
        validator.check_format(&mut row).unwrap();

        assert_eq!(row.get(SUPPLIER_NAME), Some(&CellValue::from("Acme")));
        assert_eq!(row.get(PRODUCT_NAME), Some(&CellValue::from("Widget")));
        assert_eq!(row.get("color"), Some(&CellValue::from("red [AI generated]")));
        assert_eq!(row.get("weight_kg"), Some(&CellValue::Float(2.5)));
        assert_eq!(
            row.get("notes"),
            Some(&CellValue::from("checked [AI generated]"))
        );
        assert!(matches!(row.get(CREATION_DATE), Some(CellValue::Timestamp(_))));
    }

    #[test]
    fn duplicate_pair_is_rejected() {
        let validator = RowValidator::new();
        let existing = vec![
            CatalogRow::with_identity("Acme", "Gadget"),
            CatalogRow::with_identity("Acme", "Widget"),
        ];
        let err = validator
            .check_uniqueness(&complete_row(), &existing)
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn distinct_pair_is_accepted() {
        let validator = RowValidator::new();
        let existing = vec![
            CatalogRow::with_identity("Acme", "Gadget"),
            CatalogRow::with_identity("Globex", "Widget"),
        ];
        assert!(validator.check_uniqueness(&complete_row(), &existing).is_ok());
        assert!(validator.check_uniqueness(&complete_row(), &[]).is_ok());
    }
}
