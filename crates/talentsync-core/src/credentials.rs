//! API credential lookup.
//!
//! A source without a credential is contacted unauthenticated; missing secrets are
//! never an error.

use std::collections::HashMap;
use std::env;

use crate::domain::SourceId;
use crate::source::Source;

pub trait CredentialResolver: Send + Sync {
    /// Secret for `source`, or `None` to send the request without auth headers.
    fn credential(&self, source: &Source) -> Option<String>;
}

/// Reads secrets from the process environment.
///
/// Lookup order: `TALENTSYNC_<SOURCE>_API_KEY`, then the variable named by the
/// source's `credential_key`. Blank values count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialResolver;

impl EnvCredentialResolver {
    pub fn variable_for(source_id: &SourceId) -> String {
        format!("TALENTSYNC_{}_API_KEY", source_id.env_key())
    }

    fn lookup<F>(source: &Source, read: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let primary = Self::variable_for(&source.id);
        std::iter::once(primary.as_str())
            .chain(source.credential_key.as_deref())
            .find_map(|name| read(name).filter(|value| !value.trim().is_empty()))
    }
}

impl CredentialResolver for EnvCredentialResolver {
    fn credential(&self, source: &Source) -> Option<String> {
        Self::lookup(source, |name| env::var(name).ok())
    }
}

/// Fixed in-memory credentials, keyed by source id.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    secrets: HashMap<SourceId, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source_id: SourceId, secret: impl Into<String>) -> Self {
        self.secrets.insert(source_id, secret.into());
        self
    }
}

impl CredentialResolver for StaticCredentials {
    fn credential(&self, source: &Source) -> Option<String> {
        self.secrets
            .get(&source.id)
            .filter(|secret| !secret.is_empty())
            .cloned()
    }
}
