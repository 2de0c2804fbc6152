//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::repository::open_store;

/// Create the data directory and provision the default table.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let store = open_store(settings).await?;
    store.close().await?;

    println!(
        "{} Initialized catalog store {} (table {})",
        style("✓").green(),
        settings.store_description(),
        settings.default_table
    );

    Ok(())
}
