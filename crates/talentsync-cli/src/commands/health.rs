use serde_json::json;

use crate::error::CliError;
use crate::output::EnvelopeError;

use super::{CommandResult, Context};

pub async fn run(context: &Context) -> Result<CommandResult, CliError> {
    let results = context.client.perform_health_checks().await;

    let errors = results
        .iter()
        .filter(|(_, healthy)| !**healthy)
        .map(|(source_id, _)| EnvelopeError {
            code: String::from("unhealthy"),
            message: format!("source '{source_id}' failed its health check"),
            source_id: Some(source_id.to_string()),
        })
        .collect::<Vec<_>>();
    let healthy = results.values().filter(|healthy| **healthy).count();

    let data = json!({
        "healthy": healthy,
        "total": results.len(),
        "results": results,
        "sources": context.client.sources(),
    });
    Ok(CommandResult::ok(data).with_errors(errors))
}
