use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] talentsync_core::ValidationError),

    #[error(transparent)]
    Config(#[from] talentsync_core::ConfigError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Sync(#[from] talentsync_core::SyncError),

    #[error(transparent)]
    Warehouse(#[from] talentsync_core::WarehouseError),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::Command(_) => 2,
            Self::Serialization(_) => 4,
            Self::StrictModeViolation { .. } => 5,
            Self::Sync(_) | Self::Warehouse(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
