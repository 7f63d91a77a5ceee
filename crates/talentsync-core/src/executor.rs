//! Resilient request pipeline: credentials, rate limiting, caching, transport and retry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::cache::{request_signature, CacheMode, CacheStore};
use crate::credentials::CredentialResolver;
use crate::error::RequestError;
use crate::http_client::{
    HttpAuth, HttpClient, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse, USER_AGENT,
};
use crate::retry::RetryConfig;
use crate::source::Source;
use crate::throttling::RateLimiter;

const MAX_ERROR_BODY_CHARS: usize = 256;

/// One logical API call against a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: BTreeMap<String, String>,
    pub cache_mode: CacheMode,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            params: BTreeMap::new(),
            cache_mode: CacheMode::Use,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    pub from_cache: bool,
    /// Transport attempts spent; zero for a cache hit.
    pub attempts: u32,
}

pub struct RequestExecutor {
    http: Arc<dyn HttpClient>,
    limiter: RateLimiter,
    cache: CacheStore,
    credentials: Arc<dyn CredentialResolver>,
    retry: RetryConfig,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(
        http: Arc<dyn HttpClient>,
        limiter: RateLimiter,
        cache: CacheStore,
        credentials: Arc<dyn CredentialResolver>,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            limiter,
            cache,
            credentials,
            retry,
            timeout,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub async fn execute(
        &self,
        source: &Source,
        request: &ApiRequest,
    ) -> Result<ApiResponse, RequestError> {
        let credential = self.credentials.credential(source);
        let signature = request_signature(&source.id, request.method, &request.url, &request.params);
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0_u32;

        loop {
            attempt += 1;
            self.limiter.acquire(&source.id, source.rate_limit).await;

            if attempt == 1 && request.cache_mode == CacheMode::Use {
                if let Some(body) = self.cache.get(&signature).await {
                    tracing::debug!(source_id = %source.id, url = %request.url, "cache hit");
                    return Ok(ApiResponse {
                        status: 200,
                        body,
                        from_cache: true,
                        attempts: 0,
                    });
                }
            }

            let http_request = self.build_request(request, credential.as_deref());
            let (cause, retryable) =
                match tokio::time::timeout(self.timeout, self.http.execute(http_request)).await {
                    Ok(Ok(response)) if response.is_success() => {
                        if request.cache_mode != CacheMode::Bypass {
                            self.cache
                                .put(signature, &source.id, response.body.clone(), None)
                                .await;
                        }
                        return Ok(ApiResponse {
                            status: response.status,
                            body: response.body,
                            from_cache: false,
                            attempts: attempt,
                        });
                    }
                    Ok(Ok(response)) if response.status >= 500 => (
                        RequestError::transient(format!(
                            "server responded with status {}",
                            response.status
                        )),
                        self.retry.should_retry_status(response.status),
                    ),
                    Ok(Ok(response)) if response.is_client_error() => {
                        return Err(client_error(response))
                    }
                    // 1xx and 3xx: nothing usable arrived and repeating the call will not change that.
                    Ok(Ok(response)) => (
                        RequestError::transient(format!(
                            "unexpected response status {}",
                            response.status
                        )),
                        false,
                    ),
                    Ok(Err(error)) => {
                        let retryable = match error.kind() {
                            HttpErrorKind::Timeout => self.retry.retry_on_timeout,
                            HttpErrorKind::Connect => self.retry.retry_on_connect,
                            HttpErrorKind::Other => true,
                        };
                        (RequestError::transient(error.message()), retryable)
                    }
                    Err(_) => (
                        RequestError::transient(format!(
                            "request timed out after {}ms",
                            self.timeout.as_millis()
                        )),
                        self.retry.retry_on_timeout,
                    ),
                };

            if !retryable {
                return Err(cause);
            }
            if attempt >= max_attempts {
                tracing::warn!(
                    source_id = %source.id,
                    url = %request.url,
                    attempts = attempt,
                    cause = %cause,
                    "request exhausted retries"
                );
                return Err(RequestError::RequestExhausted {
                    attempts: attempt,
                    last_cause: Box::new(cause),
                });
            }

            let delay = self.retry.delay_for_attempt(attempt - 1);
            tracing::debug!(
                source_id = %source.id,
                url = %request.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                cause = %cause,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn build_request(&self, request: &ApiRequest, credential: Option<&str>) -> HttpRequest {
        let mut http_request = HttpRequest::new(request.method, request.url.clone())
            .with_query(&request.params)
            .with_header("user-agent", USER_AGENT)
            .with_header("accept", "application/json")
            .with_header("content-type", "application/json")
            .with_header("x-request-id", Uuid::new_v4().to_string())
            .with_timeout(self.timeout);

        if let Some(token) = credential {
            http_request = http_request
                .with_auth(&HttpAuth::BearerToken(token.to_owned()))
                .with_auth(&HttpAuth::Header {
                    name: String::from("X-API-Key"),
                    value: token.to_owned(),
                });
        }

        http_request
    }
}

fn client_error(response: HttpResponse) -> RequestError {
    let message = if response.body.trim().is_empty() {
        String::from("no response body")
    } else {
        response.body.chars().take(MAX_ERROR_BODY_CHARS).collect()
    };
    RequestError::ClientRequest {
        status: response.status,
        message,
    }
}
