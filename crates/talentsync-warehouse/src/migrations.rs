use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_sync_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS jobs (
    source_id TEXT NOT NULL,
    external_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    requirements TEXT NOT NULL,
    location TEXT NOT NULL,
    salary_range TEXT,
    posted_at TEXT,
    status TEXT NOT NULL,
    applicant_count BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(source_id, external_id)
);

CREATE TABLE IF NOT EXISTS candidates (
    source_id TEXT NOT NULL,
    external_id TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    skills TEXT NOT NULL,
    experience_years INTEGER NOT NULL DEFAULT 0,
    location TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT,
    resume_url TEXT,
    match_score DOUBLE,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(source_id, external_id)
);

CREATE TABLE IF NOT EXISTS sync_outcomes (
    run_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    status TEXT NOT NULL,
    jobs_updated BIGINT NOT NULL,
    candidates_updated BIGINT NOT NULL,
    error_kind TEXT,
    error_message TEXT,
    duration_ms BIGINT NOT NULL,
    started_at TEXT NOT NULL,
    recorded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_outcome_index",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_sync_outcomes_source_started ON sync_outcomes(source_id, started_at);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
        }
    }

    Ok(())
}
