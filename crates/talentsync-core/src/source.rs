use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{SourceId, UtcDateTime};
use crate::error::{ConfigError, ValidationError};

/// Operational state of a source. Only `Active` sources are contacted by syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Active,
    Maintenance,
    Error,
}

impl SourceStatus {
    pub const ALL: [Self; 3] = [Self::Active, Self::Maintenance, Self::Error];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Maintenance => "maintenance",
            Self::Error => "error",
        }
    }
}

impl Display for SourceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "maintenance" => Ok(Self::Maintenance),
            "error" => Ok(Self::Error),
            other => Err(ValidationError::InvalidStatus {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    Government,
    Commercial,
    Regional,
    International,
    Local,
}

impl SourceCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Government => "government",
            Self::Commercial => "commercial",
            Self::Regional => "regional",
            Self::International => "international",
            Self::Local => "local",
        }
    }
}

impl FromStr for SourceCategory {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "government" => Ok(Self::Government),
            "commercial" => Ok(Self::Commercial),
            "regional" => Ok(Self::Regional),
            "international" => Ok(Self::International),
            "local" => Ok(Self::Local),
            other => Err(ValidationError::InvalidCategory {
                value: other.to_owned(),
            }),
        }
    }
}

/// Snapshot of one external platform: configuration plus live counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub base_url: String,
    pub api_endpoint: Option<String>,
    pub status: SourceStatus,
    pub category: SourceCategory,
    pub active_jobs: u64,
    pub candidates: u64,
    pub last_sync: Option<UtcDateTime>,
    /// Name of the environment variable holding this source's API token.
    pub credential_key: Option<String>,
    /// Requests per minute; falls back to the global ceiling when unset.
    pub rate_limit: Option<u32>,
}

impl Source {
    pub fn new(
        id: SourceId,
        name: impl Into<String>,
        base_url: impl Into<String>,
        category: SourceCategory,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            base_url: base_url.into(),
            api_endpoint: None,
            status: SourceStatus::Active,
            category,
            active_jobs: 0,
            candidates: 0,
            last_sync: None,
            credential_key: None,
            rate_limit: None,
        }
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_status(mut self, status: SourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_credential_key(mut self, key: impl Into<String>) -> Self {
        self.credential_key = Some(key.into());
        self
    }

    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit = Some(per_minute);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == SourceStatus::Active
    }
}

/// One `[[sources]]` table of the catalog file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogEntry {
    id: String,
    name: String,
    url: String,
    #[serde(default)]
    api_endpoint: Option<String>,
    #[serde(default)]
    status: Option<String>,
    category: String,
    #[serde(default)]
    credential_key: Option<String>,
    #[serde(default)]
    rate_limit: Option<u32>,
    #[serde(default)]
    active_jobs: u64,
    #[serde(default)]
    candidates: u64,
    #[serde(default)]
    last_sync: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    sources: Vec<CatalogEntry>,
}

/// Source catalog loaded from TOML.
///
/// ```toml
/// [[sources]]
/// id = "qiwa"
/// name = "Qiwa"
/// url = "https://qiwa.sa"
/// api_endpoint = "https://api.qiwa.sa/v1"
/// category = "government"
/// credential_key = "QIWA_API_KEY"
/// ```
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Vec<Source>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<Source>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source.id.clone()) {
                return Err(ValidationError::DuplicateSource {
                    id: source.id.to_string(),
                });
            }
            validate_url("url", &source.base_url)?;
            if let Some(endpoint) = &source.api_endpoint {
                validate_url("api_endpoint", endpoint)?;
            }
        }
        Ok(Self { sources })
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = toml::from_str(input)?;
        let mut sources = Vec::with_capacity(file.sources.len());

        for entry in file.sources {
            let status = entry
                .status
                .as_deref()
                .map(SourceStatus::from_str)
                .transpose()?
                .unwrap_or(SourceStatus::Active);
            let last_sync = entry
                .last_sync
                .as_deref()
                .map(UtcDateTime::parse)
                .transpose()?;

            sources.push(Source {
                id: SourceId::parse(&entry.id)?,
                name: entry.name,
                base_url: entry.url,
                api_endpoint: entry.api_endpoint.filter(|value| !value.trim().is_empty()),
                status,
                category: entry.category.parse()?,
                active_jobs: entry.active_jobs,
                candidates: entry.candidates,
                last_sync,
                credential_key: entry.credential_key.filter(|value| !value.trim().is_empty()),
                rate_limit: entry.rate_limit,
            });
        }

        Ok(Self::new(sources)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::CatalogIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Default catalog location: `<TALENTSYNC_HOME>/sources.toml`.
    pub fn default_path(home: &Path) -> PathBuf {
        home.join("sources.toml")
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn into_sources(self) -> Vec<Source> {
        self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    let has_scheme = trimmed.starts_with("https://") || trimmed.starts_with("http://");
    let has_host = trimmed
        .split_once("://")
        .map(|(_, rest)| !rest.is_empty() && !rest.starts_with('/'))
        .unwrap_or(false);

    if has_scheme && has_host {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl {
            field,
            value: value.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[sources]]
id = "qiwa"
name = "Qiwa"
url = "https://qiwa.sa"
api_endpoint = "https://api.qiwa.sa/v1"
category = "government"
credential_key = "QIWA_API_KEY"
active_jobs = 2450
candidates = 15420

[[sources]]
id = "Bayt"
name = "Bayt"
url = "https://www.bayt.com"
category = "regional"
status = "maintenance"
rate_limit = 30
"#;

    #[test]
    fn parses_catalog_in_file_order() {
        let catalog = SourceCatalog::from_toml_str(CATALOG).expect("valid catalog");
        let sources = catalog.sources();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].id.as_str(), "qiwa");
        assert_eq!(sources[0].status, SourceStatus::Active);
        assert_eq!(sources[0].credential_key.as_deref(), Some("QIWA_API_KEY"));
        assert_eq!(sources[0].active_jobs, 2450);
        assert_eq!(sources[1].id.as_str(), "bayt");
        assert_eq!(sources[1].status, SourceStatus::Maintenance);
        assert_eq!(sources[1].api_endpoint, None);
        assert_eq!(sources[1].rate_limit, Some(30));
    }

    #[test]
    fn rejects_duplicate_ids_after_normalization() {
        let input = r#"
[[sources]]
id = "qiwa"
name = "Qiwa"
url = "https://qiwa.sa"
category = "government"

[[sources]]
id = "QIWA"
name = "Qiwa again"
url = "https://qiwa.sa"
category = "government"
"#;

        let error = SourceCatalog::from_toml_str(input).expect_err("duplicate");
        assert!(matches!(
            error,
            ConfigError::Validation(ValidationError::DuplicateSource { .. })
        ));
    }

    #[test]
    fn rejects_invalid_urls_and_categories() {
        let bad_url = r#"
[[sources]]
id = "x"
name = "X"
url = "ftp://x"
category = "local"
"#;
        assert!(matches!(
            SourceCatalog::from_toml_str(bad_url),
            Err(ConfigError::Validation(ValidationError::InvalidUrl { field: "url", .. }))
        ));

        let bad_category = r#"
[[sources]]
id = "x"
name = "X"
url = "https://x.test"
category = "galactic"
"#;
        assert!(matches!(
            SourceCatalog::from_toml_str(bad_category),
            Err(ConfigError::Validation(ValidationError::InvalidCategory { .. }))
        ));
    }

    #[test]
    fn empty_catalog_is_valid() {
        let catalog = SourceCatalog::from_toml_str("").expect("empty");
        assert!(catalog.is_empty());
    }
}
