//! Shared fixtures for the behavior suites: a scripted transport and source builders.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use talentsync_core::{
    HttpClient, HttpError, HttpRequest, HttpResponse, Source, SourceCategory, SourceId,
};
use tokio::time::Instant;

/// Canned transport behavior for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Timeout,
    ConnectError,
    /// Never answers; only the caller's timeout ends the call.
    Hang,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Self::Status(200, body.to_owned())
    }

    pub fn status(status: u16) -> Self {
        Self::Status(status, String::new())
    }
}

struct Route {
    pattern: String,
    replies: Vec<Reply>,
    served: usize,
}

/// Transport that answers from per-URL scripts and records every call.
///
/// Routes match when the request URL contains the pattern; the first match wins.
/// The last reply of a script repeats once the script is used up. Unmatched
/// requests get `200 {}`.
#[derive(Default)]
pub struct ScriptedHttp {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<(HttpRequest, Instant)>>,
}

impl ScriptedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(self: &Arc<Self>, pattern: &str, replies: Vec<Reply>) -> Arc<Self> {
        self.routes.lock().expect("routes lock").push(Route {
            pattern: pattern.to_owned(),
            replies,
            served: 0,
        });
        Arc::clone(self)
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub fn call_times(&self, pattern: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|(request, _)| request.url.contains(pattern))
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.call_times(pattern).len()
    }

    fn next_reply(&self, url: &str) -> Reply {
        let mut routes = self.routes.lock().expect("routes lock");
        let Some(route) = routes.iter_mut().find(|route| url.contains(&route.pattern)) else {
            return Reply::ok("{}");
        };
        let index = route.served.min(route.replies.len().saturating_sub(1));
        route.served += 1;
        route.replies.get(index).cloned().unwrap_or_else(|| Reply::ok("{}"))
    }
}

impl HttpClient for ScriptedHttp {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let reply = self.next_reply(&request.url);
        self.calls
            .lock()
            .expect("calls lock")
            .push((request, Instant::now()));

        Box::pin(async move {
            match reply {
                Reply::Status(status, body) => Ok(HttpResponse::new(status, body)),
                Reply::Timeout => Err(HttpError::timeout("request timeout: scripted")),
                Reply::ConnectError => Err(HttpError::connect("connection failed: scripted")),
                Reply::Hang => std::future::pending().await,
            }
        })
    }
}

pub fn id(value: &str) -> SourceId {
    SourceId::parse(value).expect("valid source id")
}

/// Active source with base URL `https://<id>.test` and API `https://api.<id>.test/v1`.
pub fn api_source(value: &str) -> Source {
    Source::new(
        id(value),
        value.to_uppercase(),
        format!("https://{value}.test"),
        SourceCategory::Commercial,
    )
    .with_api_endpoint(format!("https://api.{value}.test/v1"))
}

pub fn jobs_body(ids: &[u32]) -> String {
    let jobs = ids
        .iter()
        .map(|job_id| {
            format!(
                r#"{{"id":{job_id},"title":"Job {job_id}","location":"Riyadh","status":"active"}}"#
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!(r#"{{"jobs":[{jobs}]}}"#)
}

pub fn candidates_body(ids: &[u32]) -> String {
    let candidates = ids
        .iter()
        .map(|candidate_id| {
            format!(
                r#"{{"id":"c-{candidate_id}","name":"Candidate {candidate_id}","skills":["rust","sql"]}}"#
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!(r#"{{"candidates":[{candidates}]}}"#)
}
