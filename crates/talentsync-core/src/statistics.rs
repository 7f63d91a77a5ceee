use serde::Serialize;

use crate::domain::UtcDateTime;
use crate::source::{Source, SourceStatus};

/// Fleet-wide summary derived from the registry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatistics {
    pub total_sources: usize,
    pub active_sources: usize,
    pub maintenance_sources: usize,
    pub error_sources: usize,
    /// Sum over every source, whether its counters came from a sync or the catalog.
    pub total_active_jobs: u64,
    pub total_candidates: u64,
    pub last_sync: Option<UtcDateTime>,
    /// Sources that have completed at least one successful sync.
    pub reporting_sources: usize,
    /// `reporting_sources / total_sources`, or zero without sources.
    pub confidence: f64,
}

impl SyncStatistics {
    pub fn from_sources(sources: &[Source]) -> Self {
        let count = |status: SourceStatus| {
            sources
                .iter()
                .filter(|source| source.status == status)
                .count()
        };
        let reporting = sources
            .iter()
            .filter(|source| source.last_sync.is_some())
            .collect::<Vec<_>>();

        let confidence = if sources.is_empty() {
            0.0
        } else {
            reporting.len() as f64 / sources.len() as f64
        };

        Self {
            total_sources: sources.len(),
            active_sources: count(SourceStatus::Active),
            maintenance_sources: count(SourceStatus::Maintenance),
            error_sources: count(SourceStatus::Error),
            total_active_jobs: sources.iter().map(|source| source.active_jobs).sum(),
            total_candidates: sources.iter().map(|source| source.candidates).sum(),
            last_sync: reporting.iter().filter_map(|source| source.last_sync).max(),
            reporting_sources: reporting.len(),
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceId;
    use crate::source::SourceCategory;

    fn source(id: &str, status: SourceStatus, jobs: u64, synced: Option<&str>) -> Source {
        let mut source = Source::new(
            SourceId::parse(id).expect("valid id"),
            id,
            "https://example.test",
            SourceCategory::Regional,
        )
        .with_status(status);
        source.active_jobs = jobs;
        source.candidates = jobs * 10;
        source.last_sync = synced.map(|value| UtcDateTime::parse(value).expect("valid timestamp"));
        source
    }

    #[test]
    fn catalog_counters_are_summed_and_never_synced_sources_lower_confidence() {
        let sources = vec![
            source("qiwa", SourceStatus::Active, 10, Some("2026-01-02T00:00:00Z")),
            source("bayt", SourceStatus::Error, 5, Some("2026-01-03T00:00:00Z")),
            source("tanqeeb", SourceStatus::Maintenance, 99, None),
            source("naukri", SourceStatus::Active, 7, None),
        ];

        let stats = SyncStatistics::from_sources(&sources);

        assert_eq!(stats.total_sources, 4);
        assert_eq!(stats.active_sources, 2);
        assert_eq!(stats.maintenance_sources, 1);
        assert_eq!(stats.error_sources, 1);
        assert_eq!(stats.total_active_jobs, 121);
        assert_eq!(stats.total_candidates, 1210);
        assert_eq!(stats.reporting_sources, 2);
        assert!((stats.confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(
            stats.last_sync,
            Some(UtcDateTime::parse("2026-01-03T00:00:00Z").expect("valid"))
        );
    }

    #[test]
    fn empty_fleet_has_zero_confidence() {
        let stats = SyncStatistics::from_sources(&[]);

        assert_eq!(stats.total_sources, 0);
        assert_eq!(stats.confidence, 0.0);
        assert_eq!(stats.last_sync, None);
    }
}
