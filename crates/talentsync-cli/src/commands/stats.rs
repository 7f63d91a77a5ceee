use serde_json::json;

use crate::error::CliError;

use super::{CommandResult, Context};

pub async fn run(context: &Context) -> Result<CommandResult, CliError> {
    let statistics = context.client.statistics();
    let warehouse = match &context.warehouse {
        Some(warehouse) => {
            let warehouse = warehouse.clone();
            let summary = tokio::task::spawn_blocking(move || warehouse.summary())
                .await
                .map_err(|error| CliError::Command(format!("warehouse task failed: {error}")))??;
            Some(summary)
        }
        None => None,
    };
    let cache = context.client.cache().stats().await;

    let data = json!({
        "statistics": statistics,
        "warehouse": warehouse,
        "cache": {
            "hits": cache.hits,
            "misses": cache.misses,
            "entries": cache.entries,
        },
    });
    Ok(CommandResult::ok(data))
}
