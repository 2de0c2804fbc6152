//! Oracle-side review of generated answers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Verdict for a single generated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValidation {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Overall verdict returned by the oracle's validation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub validation_details: BTreeMap<String, FieldValidation>,
}

impl ValidationResult {
    /// Fields the oracle flagged as invalid.
    pub fn invalid_fields(&self) -> Vec<&str> {
        self.validation_details
            .iter()
            .filter(|(_, v)| !v.valid)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}
