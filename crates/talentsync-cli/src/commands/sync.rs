use std::time::Duration;

use serde_json::json;
use talentsync_core::{SourceId, SyncOutcome, SyncStatus};

use crate::cli::SyncArgs;
use crate::error::CliError;
use crate::output::EnvelopeError;

use super::{CommandResult, Context};

pub async fn run(args: &SyncArgs, context: &Context) -> Result<CommandResult, CliError> {
    if let Some(source) = &args.source {
        let source_id = SourceId::parse(source)?;
        let outcome = context.client.sync_source(&source_id).await?;
        let errors = outcome_errors(std::slice::from_ref(&outcome));
        return Ok(CommandResult::ok(json!({ "outcome": outcome })).with_errors(errors));
    }

    let report = match args.deadline_ms {
        Some(deadline_ms) => {
            context
                .client
                .sync_all_sources_with_deadline(Duration::from_millis(deadline_ms))
                .await?
        }
        None => context.client.sync_all_sources().await?,
    };

    let mut warnings = Vec::new();
    if report.deadline_elapsed {
        warnings.push(format!(
            "deadline elapsed; {} source(s) cancelled",
            report.cancelled()
        ));
    }
    let errors = outcome_errors(&report.outcomes);
    let data = json!({
        "run_id": report.run_id,
        "succeeded": report.succeeded(),
        "failed": report.failed(),
        "cancelled": report.cancelled(),
        "duration_ms": report.duration_ms,
        "outcomes": report.outcomes,
    });

    Ok(CommandResult::ok(data)
        .with_warnings(warnings)
        .with_errors(errors))
}

fn outcome_errors(outcomes: &[SyncOutcome]) -> Vec<EnvelopeError> {
    outcomes
        .iter()
        .filter(|outcome| outcome.status == SyncStatus::Failed)
        .filter_map(|outcome| {
            outcome.error.as_ref().map(|error| EnvelopeError {
                code: error.kind.as_str().to_owned(),
                message: error.message.clone(),
                source_id: Some(outcome.source_id.to_string()),
            })
        })
        .collect()
}
