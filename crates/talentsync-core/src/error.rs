use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for catalog entries and domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("source id cannot be empty")]
    EmptySourceId,
    #[error("source id contains invalid character '{ch}' at index {index}")]
    SourceIdInvalidChar { ch: char, index: usize },
    #[error("duplicate source id '{id}'")]
    DuplicateSource { id: String },

    #[error("invalid source status '{value}', expected one of active, maintenance, error")]
    InvalidStatus { value: String },
    #[error(
        "invalid source category '{value}', expected one of government, commercial, regional, international, local"
    )]
    InvalidCategory { value: String },

    #[error("field '{field}' must be an absolute http(s) URL: '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
}

/// Configuration loading failures. These abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name}='{value}' is invalid: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read source catalog {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse source catalog: {0}")]
    CatalogParse(#[from] toml::de::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Persistence collaborator failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Warehouse(#[from] talentsync_warehouse::WarehouseError),

    #[error("store task failed: {0}")]
    Task(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Fleet-level sync errors. Per-source problems never surface here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("systemic failure: {0}")]
    Systemic(#[from] StoreError),

    #[error("a fleet sync is already in progress")]
    AlreadyRunning,
}

/// Classification recorded on failed sync outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceInactive,
    SourceNotFound,
    TransientNetworkError,
    ClientRequestError,
    RequestExhausted,
    InvalidPayload,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceInactive => "source_inactive",
            Self::SourceNotFound => "source_not_found",
            Self::TransientNetworkError => "transient_network_error",
            Self::ClientRequestError => "client_request_error",
            Self::RequestExhausted => "request_exhausted",
            Self::InvalidPayload => "invalid_payload",
        }
    }

    /// Whether a failure of this kind counts toward demoting the source.
    pub const fn counts_toward_demotion(self) -> bool {
        !matches!(self, Self::SourceInactive | Self::SourceNotFound)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one executor call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("transient network error: {message}")]
    TransientNetwork { message: String },

    #[error("request rejected with status {status}: {message}")]
    ClientRequest { status: u16, message: String },

    #[error("request exhausted after {attempts} attempt(s): {last_cause}")]
    RequestExhausted {
        attempts: u32,
        last_cause: Box<RequestError>,
    },
}

impl RequestError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetwork {
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientNetwork { .. } => ErrorKind::TransientNetworkError,
            Self::ClientRequest { .. } => ErrorKind::ClientRequestError,
            Self::RequestExhausted { .. } => ErrorKind::RequestExhausted,
        }
    }

    pub const fn retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }

    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::RequestExhausted { attempts, .. } => Some(*attempts),
            Self::TransientNetwork { .. } | Self::ClientRequest { .. } => None,
        }
    }
}
