use std::time::Duration;

use serde_json::json;
use talentsync_core::SyncConfig;

use crate::cli::MonitorArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

pub fn apply_overrides(args: &MonitorArgs, config: &mut SyncConfig) -> Result<(), CliError> {
    if let Some(interval_ms) = args.interval_ms {
        if interval_ms == 0 {
            return Err(CliError::Command(String::from(
                "--interval-ms must be greater than zero",
            )));
        }
        config.health_check_interval = Duration::from_millis(interval_ms);
    }
    Ok(())
}

pub async fn run(context: &Context) -> Result<CommandResult, CliError> {
    context.client.initialize().await;
    tracing::info!(
        interval_ms = context.client.config().health_check_interval.as_millis() as u64,
        "health monitor running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    context.client.cleanup().await;

    let data = json!({
        "statistics": context.client.statistics(),
        "sources": context.client.sources(),
    });
    Ok(CommandResult::ok(data))
}
