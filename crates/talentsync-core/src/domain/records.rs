//! Canonical job and candidate records plus normalization from platform payloads.
//!
//! Platforms answer `GET <api>/jobs` with `{"jobs": [...]}` and
//! `GET <api>/candidates` with `{"candidates": [...]}`. A missing list is an empty
//! result; a body that is not JSON (or lists of the wrong shape) is an error.
//! Individual listings without an id or with an unknown status are skipped, and
//! a listing repeated within one payload keeps only its last occurrence.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{SourceId, UtcDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Closed,
    Paused,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Paused => "paused",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" | "open" => Ok(Self::Active),
            "closed" | "filled" => Ok(Self::Closed),
            "paused" | "on_hold" => Ok(Self::Paused),
            other => Err(other.to_owned()),
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    Active,
    Hired,
    Rejected,
    Interviewing,
}

impl CandidateStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Hired => "hired",
            Self::Rejected => "rejected",
            Self::Interviewing => "interviewing",
        }
    }
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "hired" => Ok(Self::Hired),
            "rejected" => Ok(Self::Rejected),
            "interviewing" => Ok(Self::Interviewing),
            other => Err(other.to_owned()),
        }
    }
}

impl Display for CandidateStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub source_id: SourceId,
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub location: String,
    pub salary_range: Option<String>,
    pub posted_at: Option<UtcDateTime>,
    pub status: JobStatus,
    pub applicant_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub source_id: SourceId,
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub skills: BTreeSet<String>,
    pub experience_years: u32,
    pub location: String,
    pub status: CandidateStatus,
    pub created_at: Option<UtcDateTime>,
    pub resume_url: Option<String>,
    pub match_score: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid {listing} payload: {source}")]
pub struct PayloadError {
    listing: &'static str,
    #[source]
    source: serde_json::Error,
}

/// Upstream ids arrive as strings or numbers depending on the platform.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(serde_json::Number),
}

impl WireId {
    fn into_external_id(self) -> Option<String> {
        let id = match self {
            Self::Text(text) => text.trim().to_owned(),
            Self::Number(number) => number.to_string(),
        };
        (!id.is_empty()).then_some(id)
    }
}

#[derive(Debug, Deserialize)]
struct JobsEnvelope {
    #[serde(default)]
    jobs: Option<Vec<JobListing>>,
}

#[derive(Debug, Deserialize)]
struct JobListing {
    id: Option<WireId>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    requirements: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    salary_range: Option<String>,
    #[serde(default)]
    posted_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    applicant_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CandidatesEnvelope {
    #[serde(default)]
    candidates: Option<Vec<CandidateListing>>,
}

#[derive(Debug, Deserialize)]
struct CandidateListing {
    id: Option<WireId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    skills: Option<Vec<String>>,
    #[serde(default)]
    experience_years: Option<u32>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    resume_url: Option<String>,
    #[serde(default)]
    match_score: Option<f64>,
}

pub fn parse_jobs(source_id: &SourceId, body: &str) -> Result<Vec<JobRecord>, PayloadError> {
    let envelope: JobsEnvelope = serde_json::from_str(body).map_err(|source| PayloadError {
        listing: "jobs",
        source,
    })?;

    let mut records = Vec::new();
    for listing in envelope.jobs.unwrap_or_default() {
        let Some(external_id) = listing.id.and_then(WireId::into_external_id) else {
            tracing::warn!(source_id = %source_id, "skipping job listing without id");
            continue;
        };

        let status = match listing.status.as_deref().map(JobStatus::from_str) {
            None => JobStatus::Active,
            Some(Ok(status)) => status,
            Some(Err(unknown)) => {
                tracing::warn!(
                    source_id = %source_id,
                    external_id = %external_id,
                    status = %unknown,
                    "skipping job listing with unknown status"
                );
                continue;
            }
        };

        records.push(JobRecord {
            source_id: source_id.clone(),
            external_id,
            title: listing.title.unwrap_or_default(),
            description: listing.description.unwrap_or_default(),
            requirements: listing.requirements.unwrap_or_default(),
            location: listing.location.unwrap_or_default(),
            salary_range: non_empty(listing.salary_range),
            posted_at: listing
                .posted_date
                .as_deref()
                .and_then(UtcDateTime::parse_lenient),
            status,
            applicant_count: listing.applicant_count.unwrap_or(0),
        });
    }

    Ok(dedupe_by_external_id(source_id, records, |job| &job.external_id))
}

pub fn parse_candidates(
    source_id: &SourceId,
    body: &str,
) -> Result<Vec<CandidateRecord>, PayloadError> {
    let envelope: CandidatesEnvelope =
        serde_json::from_str(body).map_err(|source| PayloadError {
            listing: "candidates",
            source,
        })?;

    let mut records = Vec::new();
    for listing in envelope.candidates.unwrap_or_default() {
        let Some(external_id) = listing.id.and_then(WireId::into_external_id) else {
            tracing::warn!(source_id = %source_id, "skipping candidate listing without id");
            continue;
        };

        let status = match listing.status.as_deref().map(CandidateStatus::from_str) {
            None => CandidateStatus::Active,
            Some(Ok(status)) => status,
            Some(Err(unknown)) => {
                tracing::warn!(
                    source_id = %source_id,
                    external_id = %external_id,
                    status = %unknown,
                    "skipping candidate listing with unknown status"
                );
                continue;
            }
        };

        let skills = listing
            .skills
            .unwrap_or_default()
            .into_iter()
            .map(|skill| skill.trim().to_owned())
            .filter(|skill| !skill.is_empty())
            .collect();

        records.push(CandidateRecord {
            source_id: source_id.clone(),
            external_id,
            name: listing.name.unwrap_or_default(),
            email: listing.email.unwrap_or_default(),
            phone: non_empty(listing.phone),
            skills,
            experience_years: listing.experience_years.unwrap_or(0),
            location: listing.location.unwrap_or_default(),
            status,
            created_at: listing
                .created_date
                .as_deref()
                .and_then(UtcDateTime::parse_lenient),
            resume_url: non_empty(listing.resume_url),
            match_score: listing.match_score.filter(|score| score.is_finite()),
        });
    }

    Ok(dedupe_by_external_id(source_id, records, |candidate| {
        &candidate.external_id
    }))
}

/// Last occurrence of an id wins and takes the position of the first one.
fn dedupe_by_external_id<T>(
    source_id: &SourceId,
    records: Vec<T>,
    external_id: impl Fn(&T) -> &String,
) -> Vec<T> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<T> = Vec::with_capacity(records.len());
    for record in records {
        match positions.get(external_id(&record)).copied() {
            Some(position) => {
                tracing::debug!(
                    source_id = %source_id,
                    external_id = %external_id(&record),
                    "duplicate listing replaces an earlier one in the same payload"
                );
                unique[position] = record;
            }
            None => {
                positions.insert(external_id(&record).clone(), unique.len());
                unique.push(record);
            }
        }
    }
    unique
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qiwa() -> SourceId {
        SourceId::parse("qiwa").expect("valid id")
    }

    #[test]
    fn normalizes_job_listings() {
        let body = r#"{"jobs":[
            {"id":101,"title":"Nurse","description":"ICU","location":"Riyadh",
             "salary_range":"","posted_date":"2026-03-01","status":"open","applicant_count":12},
            {"id":"j-2","title":"Driver","status":"paused"}
        ]}"#;

        let jobs = parse_jobs(&qiwa(), body).expect("valid payload");

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].external_id, "101");
        assert_eq!(jobs[0].status, JobStatus::Active);
        assert_eq!(jobs[0].salary_range, None);
        assert_eq!(
            jobs[0].posted_at.map(UtcDateTime::format_rfc3339),
            Some(String::from("2026-03-01T00:00:00Z"))
        );
        assert_eq!(jobs[1].status, JobStatus::Paused);
        assert_eq!(jobs[1].applicant_count, 0);
        assert_eq!(jobs[1].requirements, "");
    }

    #[test]
    fn missing_list_is_empty_but_malformed_body_is_an_error() {
        assert!(parse_jobs(&qiwa(), "{}").expect("empty").is_empty());
        assert!(parse_jobs(&qiwa(), r#"{"jobs":null}"#).expect("null").is_empty());
        assert!(parse_jobs(&qiwa(), "<html>").is_err());
        assert!(parse_candidates(&qiwa(), r#"{"candidates":{"id":1}}"#).is_err());
    }

    #[test]
    fn skips_listings_without_id_or_with_unknown_status() {
        let body = r#"{"candidates":[
            {"name":"No Id"},
            {"id":"c-1","status":"ghosted"},
            {"id":"c-2","name":"Lina","skills":["SQL"," sql ","", "Rust"],"match_score":0.9}
        ]}"#;

        let candidates = parse_candidates(&qiwa(), body).expect("valid payload");

        assert_eq!(candidates.len(), 1);
        let lina = &candidates[0];
        assert_eq!(lina.external_id, "c-2");
        assert_eq!(lina.status, CandidateStatus::Active);
        assert_eq!(
            lina.skills.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["Rust", "SQL", "sql"]
        );
        assert_eq!(lina.match_score, Some(0.9));
    }

    #[test]
    fn repeated_ids_keep_the_last_listing() {
        let body = r#"{"jobs":[
            {"id":1,"title":"Nurse"},
            {"id":"2","title":"Driver"},
            {"id":"1","title":"Senior Nurse","status":"closed"}
        ]}"#;

        let jobs = parse_jobs(&qiwa(), body).expect("valid payload");

        assert_eq!(
            jobs.iter()
                .map(|job| (job.external_id.as_str(), job.title.as_str()))
                .collect::<Vec<_>>(),
            vec![("1", "Senior Nurse"), ("2", "Driver")]
        );
        assert_eq!(jobs[0].status, JobStatus::Closed);

        let candidates = parse_candidates(
            &qiwa(),
            r#"{"candidates":[{"id":"c-1","name":"Lina"},{"id":"c-1","name":"Lina A."}]}"#,
        )
        .expect("valid payload");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Lina A.");
    }
}
