//! Behavior tests for the resilient request pipeline.
//!
//! These tests drive `RequestExecutor` against a scripted transport under a paused
//! clock and verify rate limiting, retry/backoff, caching and credential handling.

mod support;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use support::{api_source, Reply, ScriptedHttp};
use talentsync_core::{
    ApiRequest, CacheMode, CacheStore, CredentialResolver, ErrorKind, RateLimiter,
    RequestError, RequestExecutor, RetryConfig, StaticCredentials,
};
use tokio::time::Instant;

fn executor_with(
    http: Arc<ScriptedHttp>,
    credentials: Arc<dyn CredentialResolver>,
) -> RequestExecutor {
    RequestExecutor::new(
        http,
        RateLimiter::new(100),
        CacheStore::new(Duration::from_secs(300)),
        credentials,
        RetryConfig::default(),
        Duration::from_secs(30),
    )
}

fn executor(http: Arc<ScriptedHttp>) -> RequestExecutor {
    executor_with(http, Arc::new(StaticCredentials::new()))
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_requests_exceed_ceiling_system_never_admits_more_than_ceiling_per_minute() {
    // Given: A source limited to 5 requests per minute
    let http = ScriptedHttp::new();
    let executor = executor(Arc::clone(&http));
    let source = api_source("qiwa").with_rate_limit(5);
    let request = ApiRequest::get("https://api.qiwa.test/v1/jobs").with_cache_mode(CacheMode::Bypass);

    // When: 12 requests are issued concurrently
    let started = Instant::now();
    let results = join_all((0..12).map(|_| executor.execute(&source, &request))).await;

    // Then: Every request succeeds but no 60 s window holds more than 5 calls
    assert!(results.iter().all(Result::is_ok));
    let times = http.call_times("api.qiwa.test");
    assert_eq!(times.len(), 12);
    for window in times.windows(6) {
        assert!(
            window[5].duration_since(window[0]) >= Duration::from_secs(60),
            "six calls inside one minute: {:?}",
            window[5].duration_since(window[0])
        );
    }
    assert_eq!(started.elapsed(), Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn when_one_source_is_throttled_other_sources_are_not_delayed() {
    // Given: Two sources sharing one limiter with a ceiling of 1
    let http = ScriptedHttp::new();
    let executor = RequestExecutor::new(
        http.clone(),
        RateLimiter::new(1),
        CacheStore::disabled(),
        Arc::new(StaticCredentials::new()),
        RetryConfig::default(),
        Duration::from_secs(30),
    );
    let qiwa = api_source("qiwa");
    let bayt = api_source("bayt");

    // When: qiwa spends its budget and bayt issues a request
    let started = Instant::now();
    executor
        .execute(&qiwa, &ApiRequest::get("https://api.qiwa.test/v1/jobs"))
        .await
        .expect("qiwa request");
    executor
        .execute(&bayt, &ApiRequest::get("https://api.bayt.test/v1/jobs"))
        .await
        .expect("bayt request");

    // Then: Neither call waited
    assert_eq!(started.elapsed(), Duration::ZERO);
}

// =============================================================================
// Retry and backoff
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_server_keeps_failing_system_retries_with_doubling_backoff_then_exhausts() {
    // Given: An endpoint that always answers 503
    let http = ScriptedHttp::new().route("api.qiwa.test", vec![Reply::status(503)]);
    let executor = executor(Arc::clone(&http));

    // When: The system requests it
    let error = executor
        .execute(&api_source("qiwa"), &ApiRequest::get("https://api.qiwa.test/v1/jobs"))
        .await
        .expect_err("should exhaust retries");

    // Then: 1 initial attempt + 3 retries spaced 1 s, 2 s and 4 s apart
    assert_eq!(error.kind(), ErrorKind::RequestExhausted);
    assert_eq!(error.attempts(), Some(4));
    match &error {
        RequestError::RequestExhausted { last_cause, .. } => {
            assert!(last_cause.to_string().contains("503"), "{last_cause}");
        }
        other => panic!("unexpected error {other:?}"),
    }

    let times = http.call_times("api.qiwa.test");
    let gaps = times
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]))
        .collect::<Vec<_>>();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn when_server_recovers_during_retries_system_returns_success() {
    // Given: An endpoint that fails twice, then answers
    let http = ScriptedHttp::new().route(
        "api.qiwa.test",
        vec![Reply::status(502), Reply::ConnectError, Reply::ok(r#"{"jobs":[]}"#)],
    );
    let executor = executor(Arc::clone(&http));

    // When: The system requests it
    let started = Instant::now();
    let response = executor
        .execute(&api_source("qiwa"), &ApiRequest::get("https://api.qiwa.test/v1/jobs"))
        .await
        .expect("third attempt succeeds");

    // Then: The response reports three attempts after 1 s + 2 s of backoff
    assert_eq!(response.attempts, 3);
    assert!(!response.from_cache);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn when_server_rejects_request_with_4xx_system_does_not_retry() {
    // Given: An endpoint answering 404
    let http = ScriptedHttp::new().route(
        "api.qiwa.test",
        vec![Reply::Status(404, String::from("no such listing"))],
    );
    let executor = executor(Arc::clone(&http));

    // When: The system requests it
    let error = executor
        .execute(&api_source("qiwa"), &ApiRequest::get("https://api.qiwa.test/v1/jobs"))
        .await
        .expect_err("404 is terminal");

    // Then: One call, classified as a client request error
    assert_eq!(
        error,
        RequestError::ClientRequest {
            status: 404,
            message: String::from("no such listing"),
        }
    );
    assert_eq!(http.count("api.qiwa.test"), 1);
}

#[tokio::test(start_paused = true)]
async fn when_server_answers_with_redirect_system_fails_without_retrying() {
    // Given: An endpoint answering 302 with no listing body
    let http = ScriptedHttp::new().route("api.qiwa.test", vec![Reply::status(302)]);
    let executor = executor(Arc::clone(&http));

    // When: The system requests it
    let started = Instant::now();
    let error = executor
        .execute(&api_source("qiwa"), &ApiRequest::get("https://api.qiwa.test/v1/jobs"))
        .await
        .expect_err("302 carries no listing");

    // Then: One call, reported as a network failure rather than a client error
    assert_eq!(error.kind(), ErrorKind::TransientNetworkError);
    assert!(matches!(error, RequestError::TransientNetwork { .. }));
    assert_eq!(http.count("api.qiwa.test"), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn when_transport_hangs_system_times_out_each_attempt_and_exhausts() {
    // Given: An endpoint that never answers
    let http = ScriptedHttp::new().route("api.qiwa.test", vec![Reply::Hang]);
    let executor = executor(Arc::clone(&http));

    // When: The system requests it
    let started = Instant::now();
    let error = executor
        .execute(&api_source("qiwa"), &ApiRequest::get("https://api.qiwa.test/v1/jobs"))
        .await
        .expect_err("every attempt times out");

    // Then: Four 30 s timeouts plus 7 s of backoff
    assert_eq!(error.attempts(), Some(4));
    assert_eq!(started.elapsed(), Duration::from_secs(4 * 30 + 7));
}

#[tokio::test(start_paused = true)]
async fn when_retries_are_disabled_system_makes_a_single_attempt() {
    // Given: An executor with retries disabled
    let http = ScriptedHttp::new().route("api.qiwa.test", vec![Reply::Timeout]);
    let executor = RequestExecutor::new(
        http.clone(),
        RateLimiter::new(100),
        CacheStore::disabled(),
        Arc::new(StaticCredentials::new()),
        RetryConfig::no_retry(),
        Duration::from_secs(30),
    );

    // When: The request fails
    let error = executor
        .execute(&api_source("qiwa"), &ApiRequest::get("https://api.qiwa.test/v1/jobs"))
        .await
        .expect_err("fails");

    // Then: Exactly one call was made
    assert_eq!(error.attempts(), Some(1));
    assert_eq!(http.count("api.qiwa.test"), 1);
}

// =============================================================================
// Response cache
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_identical_requests_arrive_within_ttl_system_calls_transport_once() {
    // Given: A cache with a 5 minute TTL
    let http = ScriptedHttp::new();
    let executor = executor(Arc::clone(&http));
    let source = api_source("qiwa");
    let request = ApiRequest::get("https://api.qiwa.test/v1/jobs").with_param("limit", "100");

    // When: The same request is made twice
    let first = executor.execute(&source, &request).await.expect("first");
    let second = executor.execute(&source, &request).await.expect("second");

    // Then: Only the first reached the transport
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.body, first.body);
    assert_eq!(http.count("api.qiwa.test"), 1);
}

#[tokio::test(start_paused = true)]
async fn when_cached_entry_expires_system_fetches_again() {
    // Given: A cached response
    let http = ScriptedHttp::new();
    let executor = executor(Arc::clone(&http));
    let source = api_source("qiwa");
    let request = ApiRequest::get("https://api.qiwa.test/v1/jobs");
    executor.execute(&source, &request).await.expect("prime cache");

    // When: The TTL elapses
    tokio::time::advance(Duration::from_secs(300)).await;
    let response = executor.execute(&source, &request).await.expect("refetch");

    // Then: The expired entry is not served
    assert!(!response.from_cache);
    assert_eq!(http.count("api.qiwa.test"), 2);
}

#[tokio::test(start_paused = true)]
async fn when_params_differ_system_does_not_share_cache_entries() {
    // Given: Two requests that differ only in a query parameter
    let http = ScriptedHttp::new();
    let executor = executor(Arc::clone(&http));
    let source = api_source("qiwa");

    // When: Both are made
    executor
        .execute(&source, &ApiRequest::get("https://api.qiwa.test/v1/jobs").with_param("limit", "10"))
        .await
        .expect("first");
    executor
        .execute(&source, &ApiRequest::get("https://api.qiwa.test/v1/jobs").with_param("limit", "20"))
        .await
        .expect("second");

    // Then: Both reached the transport
    assert_eq!(http.count("api.qiwa.test"), 2);
}

#[tokio::test(start_paused = true)]
async fn when_refresh_mode_is_used_system_skips_cache_read_but_updates_it() {
    // Given: A cached response
    let http = ScriptedHttp::new().route(
        "api.qiwa.test",
        vec![Reply::ok(r#"{"jobs":[]}"#), Reply::ok(r#"{"jobs":[{"id":1}]}"#)],
    );
    let executor = executor(Arc::clone(&http));
    let source = api_source("qiwa");
    let request = ApiRequest::get("https://api.qiwa.test/v1/jobs");
    executor.execute(&source, &request).await.expect("prime cache");

    // When: A refresh request is made, followed by a normal one
    let refreshed = executor
        .execute(&source, &request.clone().with_cache_mode(CacheMode::Refresh))
        .await
        .expect("refresh");
    let cached = executor.execute(&source, &request).await.expect("cached");

    // Then: The refresh went to the network and its body is what the cache now holds
    assert!(!refreshed.from_cache);
    assert!(cached.from_cache);
    assert_eq!(cached.body, r#"{"jobs":[{"id":1}]}"#);
    assert_eq!(http.count("api.qiwa.test"), 2);
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_credential_is_missing_system_sends_request_without_auth_headers() {
    // Given: No credential for the source
    let http = ScriptedHttp::new();
    let executor = executor(Arc::clone(&http));

    // When: A request is made
    executor
        .execute(&api_source("qiwa"), &ApiRequest::get("https://api.qiwa.test/v1/jobs"))
        .await
        .expect("unauthenticated request still succeeds");

    // Then: No auth headers were attached
    let calls = http.calls();
    assert!(!calls[0].headers.contains_key("authorization"));
    assert!(!calls[0].headers.contains_key("x-api-key"));
    assert_eq!(
        calls[0].headers.get("accept").map(String::as_str),
        Some("application/json")
    );
}

#[tokio::test(start_paused = true)]
async fn when_credential_is_present_each_attempt_carries_it_with_fresh_request_id() {
    // Given: A credential and an endpoint that fails once
    let http = ScriptedHttp::new().route("api.qiwa.test", vec![Reply::status(500), Reply::ok("{}")]);
    let source = api_source("qiwa");
    let credentials = StaticCredentials::new().with(source.id.clone(), "token-1");
    let executor = executor_with(Arc::clone(&http), Arc::new(credentials));

    // When: The request is retried
    executor
        .execute(&source, &ApiRequest::get("https://api.qiwa.test/v1/jobs"))
        .await
        .expect("second attempt succeeds");

    // Then: Both attempts are authenticated and carry distinct request ids
    let calls = http.calls();
    assert_eq!(calls.len(), 2);
    for call in &calls {
        assert_eq!(
            call.headers.get("authorization").map(String::as_str),
            Some("Bearer token-1")
        );
        assert_eq!(call.headers.get("x-api-key").map(String::as_str), Some("token-1"));
    }
    assert_ne!(
        calls[0].headers.get("x-request-id"),
        calls[1].headers.get("x-request-id")
    );
}
