use serde::Serialize;

use talentsync_core::{Source, SourceStatus};

use crate::cli::SourcesArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    count: usize,
    sources: Vec<Source>,
}

pub fn run(args: &SourcesArgs, context: &Context) -> Result<CommandResult, CliError> {
    let status = args
        .status
        .as_deref()
        .map(str::parse::<SourceStatus>)
        .transpose()?;

    let sources = context
        .client
        .sources()
        .into_iter()
        .filter(|source| status.is_none_or(|status| source.status == status))
        .collect::<Vec<_>>();

    let data = serde_json::to_value(SourcesResponseData {
        count: sources.len(),
        sources,
    })?;
    Ok(CommandResult::ok(data))
}
