//! Table listing command.

use crate::config::Settings;
use crate::repository::open_store;

/// Print every row of `table` as a JSON array.
pub async fn cmd_data(settings: &Settings, table: Option<&str>) -> anyhow::Result<()> {
    let table = table.unwrap_or(&settings.default_table);

    settings.ensure_directories()?;
    let store = open_store(settings).await?;
    let data = store.read(table).await;
    store.close().await?;

    let data = data?;
    println!("{}", serde_json::to_string_pretty(&data.rows)?);
    Ok(())
}
