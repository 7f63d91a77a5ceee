mod health;
mod monitor;
mod sources;
mod stats;
mod sync;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use talentsync_core::{
    MemoryStore, SourceCatalog, SyncClient, SyncClientBuilder, SyncConfig, SyncStore, UtcDateTime,
    Warehouse, WarehouseConfig,
};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

/// Everything a command needs: the client plus the optional warehouse behind it.
pub struct Context {
    pub client: SyncClient,
    pub warehouse: Option<Warehouse>,
    pub warnings: Vec<String>,
}

impl Context {
    fn load(cli: &Cli, config: SyncConfig) -> Result<Self, CliError> {
        let warehouse_config = WarehouseConfig::default();
        let mut warnings = Vec::new();

        let catalog = match &cli.catalog {
            Some(path) => SourceCatalog::load(path)?,
            None => {
                let path = SourceCatalog::default_path(&warehouse_config.talentsync_home);
                if path.exists() {
                    SourceCatalog::load(&path)?
                } else {
                    warnings.push(format!(
                        "no source catalog at {}; nothing to sync",
                        path.display()
                    ));
                    SourceCatalog::default()
                }
            }
        };

        let warehouse = if cli.memory {
            None
        } else {
            Some(Warehouse::open(warehouse_config)?)
        };
        let store: Arc<dyn SyncStore> = match &warehouse {
            Some(warehouse) => Arc::new(warehouse.clone()),
            None => Arc::new(MemoryStore::new()),
        };

        let client = SyncClientBuilder::new(catalog.into_sources())
            .with_config(config)
            .with_store(store)
            .build();

        Ok(Self {
            client,
            warehouse,
            warnings,
        })
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    let started = Instant::now();
    let mut config = SyncConfig::from_env()?;
    if let Command::Monitor(args) = &cli.command {
        monitor::apply_overrides(args, &mut config)?;
    }
    let context = Context::load(cli, config)?;

    let (command, result) = match &cli.command {
        Command::Sync(args) => ("sync", sync::run(args, &context).await),
        Command::Sources(args) => ("sources", sources::run(args, &context)),
        Command::Health => ("health", health::run(&context).await),
        Command::Stats => ("stats", stats::run(&context).await),
        Command::Monitor(_) => ("monitor", monitor::run(&context).await),
    };
    context.client.cleanup().await;

    let CommandResult {
        data,
        warnings,
        errors,
    } = result?;

    let meta = EnvelopeMeta {
        request_id: Uuid::new_v4().to_string(),
        schema_version: SCHEMA_VERSION,
        command,
        generated_at: UtcDateTime::now().format_rfc3339(),
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        warnings: context.warnings.into_iter().chain(warnings).collect(),
    };

    Ok(Envelope { meta, data, errors })
}
