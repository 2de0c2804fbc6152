//! One-shot generate-entry command.

use console::style;
use serde_json::json;

use crate::config::Settings;
use crate::repository::open_store;
use crate::server::build_orchestrator;
use crate::services::EntryOutcome;

/// Run the pipeline once and print the outcome as JSON.
///
/// Exits with status 1 when the entry was rejected or failed.
pub async fn cmd_generate(
    settings: &Settings,
    supplier: &str,
    product: &str,
    table: Option<&str>,
) -> anyhow::Result<()> {
    let table = table.unwrap_or(&settings.default_table);

    settings.ensure_directories()?;
    let orchestrator = build_orchestrator(settings, open_store(settings).await?)?;

    eprintln!(
        "{} Generating entry for {} / {} in {}",
        style("→").cyan(),
        supplier,
        product,
        table
    );
    let outcome = orchestrator.generate_entry(supplier, product, table).await;
    orchestrator.store().close().await?;

    let (body, ok) = match outcome {
        EntryOutcome::Persisted(entry) => {
            eprintln!("  {} Entry stored", style("✓").green());
            (
                json!({
                    "status": "success",
                    "table": entry.table,
                    "source_url": entry.source_url,
                    "row": entry.row,
                }),
                true,
            )
        }
        EntryOutcome::RejectedByValidation(review) => {
            eprintln!(
                "  {} Generated data failed validation: {}",
                style("✗").red(),
                review.invalid_fields().join(", ")
            );
            (
                json!({
                    "status": "error",
                    "message": "Generated data failed validation",
                    "validation_details": review,
                }),
                false,
            )
        }
        EntryOutcome::Failed(e) => {
            eprintln!("  {} {}", style("✗").red(), e);
            (
                json!({
                    "status": "error",
                    "kind": e.kind().as_str(),
                    "message": e.to_string(),
                }),
                false,
            )
        }
    };

    println!("{}", serde_json::to_string_pretty(&body)?);
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
