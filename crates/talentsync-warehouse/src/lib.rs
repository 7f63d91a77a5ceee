pub mod duckdb;
pub mod migrations;

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection, OptionalExt};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to encode column '{column}': {source}")]
    Encode {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub talentsync_home: PathBuf,
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let talentsync_home = resolve_talentsync_home();
        let db_path = talentsync_home.join("warehouse.duckdb");
        Self {
            talentsync_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    pub fn in_dir(home: impl Into<PathBuf>) -> Self {
        let talentsync_home = home.into();
        let db_path = talentsync_home.join("warehouse.duckdb");
        Self {
            talentsync_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// Flat job row as persisted in the `jobs` table.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub source_id: String,
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub location: String,
    pub salary_range: Option<String>,
    pub posted_at: Option<String>,
    pub status: String,
    pub applicant_count: u64,
}

/// Flat candidate row as persisted in the `candidates` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub source_id: String,
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub experience_years: u32,
    pub location: String,
    pub status: String,
    pub created_at: Option<String>,
    pub resume_url: Option<String>,
    pub match_score: Option<f64>,
}

/// One line of the append-only sync audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcomeRow {
    pub run_id: String,
    pub source_id: String,
    pub status: String,
    pub jobs_updated: u64,
    pub candidates_updated: u64,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub started_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarehouseSummary {
    pub db_path: PathBuf,
    pub jobs: u64,
    pub candidates: u64,
    pub sync_outcomes: u64,
    pub last_outcome: Option<SyncOutcomeRow>,
}

#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn home(&self) -> &Path {
        self.config.talentsync_home.as_path()
    }

    /// Insert or replace jobs keyed by `(source_id, external_id)`.
    pub fn upsert_jobs(&self, rows: &[JobRow]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare(
                r#"
INSERT OR REPLACE INTO jobs (
    source_id, external_id, title, description, requirements, location,
    salary_range, posted_at, status, applicant_count, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
"#,
            )?;
            let latest = latest_per_key(rows, |row| (&row.source_id, &row.external_id));
            for row in &latest {
                statement.execute(params![
                    row.source_id,
                    row.external_id,
                    row.title,
                    row.description,
                    row.requirements,
                    row.location,
                    row.salary_range,
                    row.posted_at,
                    row.status,
                    clamp_i64(row.applicant_count),
                ])?;
            }
            Ok(latest.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Insert or replace candidates keyed by `(source_id, external_id)`.
    pub fn upsert_candidates(&self, rows: &[CandidateRow]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare(
                r#"
INSERT OR REPLACE INTO candidates (
    source_id, external_id, name, email, phone, skills, experience_years,
    location, status, created_at, resume_url, match_score, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
"#,
            )?;
            let latest = latest_per_key(rows, |row| (&row.source_id, &row.external_id));
            for row in &latest {
                let skills = serde_json::to_string(&row.skills).map_err(|source| {
                    WarehouseError::Encode {
                        column: "skills",
                        source,
                    }
                })?;
                statement.execute(params![
                    row.source_id,
                    row.external_id,
                    row.name,
                    row.email,
                    row.phone,
                    skills,
                    row.experience_years,
                    row.location,
                    row.status,
                    row.created_at,
                    row.resume_url,
                    row.match_score,
                ])?;
            }
            Ok(latest.len())
        })();

        finalize_transaction(&connection, result)
    }

    pub fn append_sync_outcome(&self, row: &SyncOutcomeRow) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute(
            r#"
INSERT INTO sync_outcomes (
    run_id, source_id, status, jobs_updated, candidates_updated,
    error_kind, error_message, duration_ms, started_at, recorded_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
"#,
            params![
                row.run_id,
                row.source_id,
                row.status,
                clamp_i64(row.jobs_updated),
                clamp_i64(row.candidates_updated),
                row.error_kind,
                row.error_message,
                clamp_i64(row.duration_ms),
                row.started_at,
            ],
        )?;
        Ok(())
    }

    pub fn job_count(&self, source_id: Option<&str>) -> Result<u64, WarehouseError> {
        self.count_rows("jobs", source_id)
    }

    pub fn candidate_count(&self, source_id: Option<&str>) -> Result<u64, WarehouseError> {
        self.count_rows("candidates", source_id)
    }

    pub fn outcome_count(&self, source_id: Option<&str>) -> Result<u64, WarehouseError> {
        self.count_rows("sync_outcomes", source_id)
    }

    pub fn summary(&self) -> Result<WarehouseSummary, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let last_outcome = connection
            .query_row(
                r#"
SELECT run_id, source_id, status, jobs_updated, candidates_updated,
       error_kind, error_message, duration_ms, started_at
FROM sync_outcomes
ORDER BY recorded_at DESC
LIMIT 1
"#,
                [],
                |row| {
                    Ok(SyncOutcomeRow {
                        run_id: row.get(0)?,
                        source_id: row.get(1)?,
                        status: row.get(2)?,
                        jobs_updated: clamp_u64(row.get(3)?),
                        candidates_updated: clamp_u64(row.get(4)?),
                        error_kind: row.get(5)?,
                        error_message: row.get(6)?,
                        duration_ms: clamp_u64(row.get(7)?),
                        started_at: row.get(8)?,
                    })
                },
            )
            .optional()?;
        drop(connection);

        Ok(WarehouseSummary {
            db_path: self.db_path().to_path_buf(),
            jobs: self.job_count(None)?,
            candidates: self.candidate_count(None)?,
            sync_outcomes: self.outcome_count(None)?,
            last_outcome,
        })
    }

    fn count_rows(&self, table: &'static str, source_id: Option<&str>) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let count: i64 = match source_id {
            Some(source_id) => connection.query_row(
                format!("SELECT COUNT(*) FROM {table} WHERE source_id = ?").as_str(),
                params![source_id],
                |row| row.get(0),
            )?,
            None => connection.query_row(
                format!("SELECT COUNT(*) FROM {table}").as_str(),
                [],
                |row| row.get(0),
            )?,
        };
        Ok(clamp_u64(count))
    }
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_talentsync_home() -> PathBuf {
    if let Some(path) = env::var_os("TALENTSYNC_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".talentsync");
    }

    PathBuf::from(".talentsync")
}

/// Keeps the last row for each key, in batch order. A key is written once per transaction.
fn latest_per_key<R>(rows: &[R], key: impl Fn(&R) -> (&String, &String)) -> Vec<&R> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut latest = rows
        .iter()
        .rev()
        .filter(|row| seen.insert(key(*row)))
        .collect::<Vec<_>>();
    latest.reverse();
    latest
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn clamp_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp(temp: &tempfile::TempDir) -> Warehouse {
        Warehouse::open(WarehouseConfig {
            talentsync_home: temp.path().to_path_buf(),
            db_path: temp.path().join("db").join("warehouse.duckdb"),
            max_pool_size: 2,
        })
        .expect("warehouse open")
    }

    fn job(source: &str, id: &str, title: &str) -> JobRow {
        JobRow {
            source_id: source.to_owned(),
            external_id: id.to_owned(),
            title: title.to_owned(),
            description: String::from("desc"),
            requirements: String::new(),
            location: String::from("Riyadh"),
            salary_range: None,
            posted_at: Some(String::from("2026-01-05T09:00:00Z")),
            status: String::from("active"),
            applicant_count: 4,
        }
    }

    #[test]
    fn migrations_are_reapplied_safely() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);
        warehouse.initialize().expect("second initialize");

        assert_eq!(warehouse.job_count(None).expect("count"), 0);
        assert!(warehouse.db_path().exists());
    }

    #[test]
    fn job_upsert_replaces_on_source_and_external_id() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        warehouse
            .upsert_jobs(&[job("qiwa", "j-1", "Nurse"), job("qiwa", "j-2", "Driver")])
            .expect("first upsert");
        warehouse
            .upsert_jobs(&[job("qiwa", "j-1", "Senior Nurse"), job("bayt", "j-1", "Nurse")])
            .expect("second upsert");

        assert_eq!(warehouse.job_count(None).expect("count"), 3);
        assert_eq!(warehouse.job_count(Some("qiwa")).expect("count"), 2);
    }

    #[test]
    fn repeated_key_in_one_batch_is_reported_once() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let written = warehouse
            .upsert_jobs(&[job("qiwa", "1", "Nurse"), job("qiwa", "1", "Senior Nurse")])
            .expect("upsert");

        assert_eq!(written, 1);
        assert_eq!(warehouse.job_count(None).expect("count"), 1);
        let connection = warehouse
            .manager
            .acquire(AccessMode::ReadOnly)
            .expect("connection");
        let title: String = connection
            .query_row("SELECT title FROM jobs", [], |row| row.get(0))
            .expect("title");
        assert_eq!(title, "Senior Nurse");
    }

    #[test]
    fn candidate_skills_are_stored_as_json() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let row = CandidateRow {
            source_id: String::from("linkedin"),
            external_id: String::from("c-9"),
            name: String::from("Sara"),
            email: String::from("sara@example.test"),
            phone: None,
            skills: vec![String::from("rust"), String::from("sql, advanced")],
            experience_years: 6,
            location: String::from("Jeddah"),
            status: String::from("interviewing"),
            created_at: None,
            resume_url: None,
            match_score: Some(0.82),
        };
        warehouse.upsert_candidates(&[row]).expect("upsert");

        let connection = warehouse
            .manager
            .acquire(AccessMode::ReadOnly)
            .expect("connection");
        let skills: String = connection
            .query_row("SELECT skills FROM candidates", [], |row| row.get(0))
            .expect("skills");
        assert_eq!(skills, r#"["rust","sql, advanced"]"#);
    }

    #[test]
    fn outcomes_are_append_only() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);
        let row = SyncOutcomeRow {
            run_id: String::from("run-1"),
            source_id: String::from("qiwa"),
            status: String::from("failed"),
            jobs_updated: 0,
            candidates_updated: 0,
            error_kind: Some(String::from("request_exhausted")),
            error_message: Some(String::from("timeout")),
            duration_ms: 7_000,
            started_at: String::from("2026-01-05T09:00:00Z"),
        };

        warehouse.append_sync_outcome(&row).expect("append");
        warehouse.append_sync_outcome(&row).expect("append again");

        let summary = warehouse.summary().expect("summary");
        assert_eq!(summary.sync_outcomes, 2);
        assert_eq!(summary.last_outcome.map(|row| row.source_id), Some(String::from("qiwa")));
    }
}
