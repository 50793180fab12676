#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use repo_scout::sinks::SinkError;
use repo_scout::types::*;
use repo_scout::{BackendError, CandidateSource, ExcerptSource, JudgmentBackend, NotificationSink};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

pub fn candidate(full_name: &str, stars: u64, is_fork: bool) -> Candidate {
    Candidate {
        full_name: full_name.to_string(),
        url: format!("https://github.com/{}", full_name),
        description: format!("{} description", full_name),
        stars,
        language: "Rust".to_string(),
        topics: vec!["cli".to_string()],
        is_fork,
        created_at: Utc::now(),
    }
}

/// a/x (50), b/y (80, fork), c/z (30).
pub fn sample_candidates() -> Vec<Candidate> {
    vec![
        candidate("a/x", 50, false),
        candidate("b/y", 80, true),
        candidate("c/z", 30, false),
    ]
}

pub fn query(keywords: &[&str], since: DateTime<Utc>) -> SearchQuery {
    SearchQuery {
        since,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        max_results: 100,
        min_stars: 0,
    }
}

pub fn profile() -> InterestProfile {
    InterestProfile {
        uri: "prompt.md".to_string(),
        text: "Developer tools written in Rust.".to_string(),
    }
}

/// Index stub that returns fixed hits and leaves keyword matching to the client.
pub struct StaticSource {
    items: Vec<Candidate>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(items: Vec<Candidate>) -> Self {
        Self {
            items,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            items: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CandidateSource for StaticSource {
    fn source_name(&self) -> String {
        "static".to_string()
    }

    async fn search(&self, _query: &SearchQuery) -> Result<SearchHits> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ScoutError::SourceUnavailable("HTTP 503: Service Unavailable".to_string()));
        }
        Ok(SearchHits {
            items: self.items.clone(),
            keywords_applied: false,
        })
    }
}

/// README stub: a generic README per repo unless one was set with `with`.
#[derive(Default)]
pub struct StaticExcerpts {
    readmes: HashMap<String, String>,
}

impl StaticExcerpts {
    pub fn with(mut self, full_name: &str, readme: &str) -> Self {
        self.readmes.insert(full_name.to_string(), readme.to_string());
        self
    }
}

#[async_trait]
impl ExcerptSource for StaticExcerpts {
    async fn fetch_excerpt(&self, full_name: &str) -> Result<Option<String>> {
        Ok(Some(
            self.readmes
                .get(full_name)
                .cloned()
                .unwrap_or_else(|| format!("# {}\n\nA README.", full_name)),
        ))
    }
}

/// Backend with a fixed verdict per repo name. Names listed in `failing`
/// return a malformed-reply error; unknown names are rejected.
#[derive(Default)]
pub struct FixedBackend {
    verdicts: HashMap<String, Verdict>,
    failing: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FixedBackend {
    pub fn new(verdicts: &[(&str, Verdict)]) -> Self {
        Self {
            verdicts: verdicts.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JudgmentBackend for FixedBackend {
    fn backend_name(&self) -> String {
        "fixed".to_string()
    }

    async fn evaluate(
        &self,
        candidate: &EnrichedCandidate,
        _profile: &InterestProfile,
    ) -> std::result::Result<Verdict, BackendError> {
        let name = candidate.full_name().to_string();
        self.calls.lock().unwrap().push(name.clone());

        if self.failing.contains(&name) {
            return Err(BackendError::Malformed {
                backend: "fixed".to_string(),
                message: "reply was not JSON".to_string(),
            });
        }

        Ok(self
            .verdicts
            .get(&name)
            .cloned()
            .unwrap_or_else(|| Verdict::reject("not relevant")))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub summaries: Mutex<Vec<(usize, usize)>>,
    pub delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn delivered_names(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.full_name.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn sink_name(&self) -> String {
        "recording".to_string()
    }

    async fn send_summary(&self, matched: usize, processed: usize) -> std::result::Result<(), SinkError> {
        self.summaries.lock().unwrap().push((matched, processed));
        Ok(())
    }

    async fn deliver(&self, batch: &[Notification]) -> std::result::Result<(), SinkError> {
        self.delivered.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }
}

pub fn rejection_entries(path: &std::path::Path) -> usize {
    std::fs::read_to_string(path)
        .map(|contents| contents.matches("  Reason: ").count())
        .unwrap_or(0)
}

/// One request as seen by [`StubServer`].
#[derive(Debug, Clone)]
pub struct StubRequest {
    pub path: String,
    pub params: HashMap<String, String>,
    pub headers: axum::http::HeaderMap,
    pub body: String,
}

impl StubRequest {
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

type Responder = dyn Fn(&StubRequest) -> (u16, String) + Send + Sync;

#[derive(Clone)]
struct StubState {
    responder: Arc<Responder>,
    log: Arc<Mutex<Vec<StubRequest>>>,
}

/// Local HTTP server answering every path with a JSON body from `responder`.
pub struct StubServer {
    pub url: String,
    log: Arc<Mutex<Vec<StubRequest>>>,
}

impl StubServer {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&StubRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let log = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            responder: Arc::new(responder),
            log: log.clone(),
        };
        let app = axum::Router::new().fallback(answer).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}", addr),
            log,
        }
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.log.lock().unwrap().clone()
    }
}

async fn answer(
    axum::extract::State(state): axum::extract::State<StubState>,
    uri: axum::http::Uri,
    axum::extract::Query(params): axum::extract::Query<HashMap<String, String>>,
    headers: axum::http::HeaderMap,
    body: String,
) -> (axum::http::StatusCode, [(axum::http::header::HeaderName, &'static str); 1], String) {
    let request = StubRequest {
        path: uri.path().to_string(),
        params,
        headers,
        body,
    };
    let (status, reply) = (state.responder)(&request);
    state.log.lock().unwrap().push(request);

    let status = axum::http::StatusCode::from_u16(status).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(axum::http::header::CONTENT_TYPE, "application/json")], reply)
}

/// An address nothing is listening on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
