//! Behavior tests for the DuckDB-backed store.

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use support::{api_source, candidates_body, id, jobs_body, Reply, ScriptedHttp};
use talentsync_core::{
    CandidateRecord, CandidateStatus, JobRecord, JobStatus, NoopSink, StaticCredentials,
    SyncClientBuilder, SyncStore, UtcDateTime, Warehouse, WarehouseConfig,
};

fn warehouse(dir: &tempfile::TempDir) -> Warehouse {
    Warehouse::open(WarehouseConfig::in_dir(dir.path())).expect("warehouse opens")
}

fn job(source: &str, external_id: &str, title: &str) -> JobRecord {
    JobRecord {
        source_id: id(source),
        external_id: external_id.to_owned(),
        title: title.to_owned(),
        description: String::from("Full-time role"),
        requirements: String::from("5 years"),
        location: String::from("Jeddah"),
        salary_range: Some(String::from("15000-20000 SAR")),
        posted_at: Some(UtcDateTime::parse("2026-03-01T08:00:00Z").expect("timestamp")),
        status: JobStatus::Active,
        applicant_count: 12,
    }
}

fn candidate(source: &str, external_id: &str) -> CandidateRecord {
    CandidateRecord {
        source_id: id(source),
        external_id: external_id.to_owned(),
        name: String::from("Sara"),
        email: String::from("sara@example.test"),
        phone: None,
        skills: BTreeSet::from([String::from("nursing"), String::from("icu")]),
        experience_years: 6,
        location: String::from("Riyadh"),
        status: CandidateStatus::Interviewing,
        created_at: None,
        resume_url: None,
        match_score: Some(0.82),
    }
}

#[tokio::test]
async fn when_records_are_upserted_twice_warehouse_keeps_one_row_per_key() {
    // Given: An empty warehouse
    let dir = tempfile::tempdir().expect("tempdir");
    let warehouse = warehouse(&dir);

    // When: The same keys are written twice, the second time with new values
    let store: &dyn SyncStore = &warehouse;
    store
        .upsert_jobs(vec![job("qiwa", "1", "Nurse"), job("qiwa", "2", "Driver")])
        .await
        .expect("first upsert");
    let written = store
        .upsert_jobs(vec![job("qiwa", "1", "Senior Nurse"), job("bayt", "1", "Nurse")])
        .await
        .expect("second upsert");
    store
        .upsert_candidates(vec![candidate("qiwa", "c-1")])
        .await
        .expect("candidates");
    store
        .upsert_candidates(vec![candidate("qiwa", "c-1")])
        .await
        .expect("candidates again");

    // Then: Rows are keyed by (source, external id)
    assert_eq!(written, 2);
    assert_eq!(warehouse.job_count(None).expect("count"), 3);
    assert_eq!(warehouse.job_count(Some("qiwa")).expect("count"), 2);
    assert_eq!(warehouse.candidate_count(None).expect("count"), 1);
}

#[tokio::test]
async fn when_fleet_syncs_into_warehouse_outcomes_are_appended_per_run() {
    // Given: A client writing to a warehouse, one good and one failing source
    let dir = tempfile::tempdir().expect("tempdir");
    let warehouse = warehouse(&dir);
    let http = ScriptedHttp::new()
        .route("api.qiwa.test/v1/jobs", vec![Reply::ok(&jobs_body(&[1, 2]))])
        .route("api.qiwa.test/v1/candidates", vec![Reply::ok(&candidates_body(&[9]))])
        .route("api.bayt.test", vec![Reply::status(403)]);
    let client = SyncClientBuilder::new(vec![api_source("qiwa"), api_source("bayt")])
        .with_http_client(http)
        .with_credentials(Arc::new(StaticCredentials::new()))
        .with_store(Arc::new(warehouse.clone()))
        .with_event_sink(Arc::new(NoopSink))
        .build();

    // When: The fleet is synced twice
    client.sync_all_sources().await.expect("first run");
    client.sync_all_sources().await.expect("second run");

    // Then: Records are stable and every outcome is in the audit trail
    assert_eq!(warehouse.job_count(None).expect("count"), 2);
    assert_eq!(warehouse.candidate_count(None).expect("count"), 1);
    assert_eq!(warehouse.outcome_count(None).expect("count"), 4);
    assert_eq!(warehouse.outcome_count(Some("bayt")).expect("count"), 2);

    let summary = warehouse.summary().expect("summary");
    assert_eq!(summary.sync_outcomes, 4);
    assert!(summary.last_outcome.is_some());
}
