//! catalog-enrich - supplier/product catalog enrichment.
//!
//! Given a supplier and a product, reads the existing catalog rows, searches
//! the web for the product, asks a language model to answer the catalog's
//! columns, validates the answers and appends a new row.

pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod server;
pub mod services;
pub mod validation;
