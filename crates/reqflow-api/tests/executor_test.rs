#![allow(clippy::unwrap_used)]
// Integration tests for both HTTP executors using wiremock.

use std::sync::Mutex;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reqflow_api::{
    Envelope, EventSink, HttpExecutor, Payload, Progress, RequestError, ResolvedRequest,
};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
    phases: Mutex<Vec<&'static str>>,
    uploads: Mutex<Vec<Progress>>,
    downloads: Mutex<Vec<Progress>>,
}

impl RecordingSink {
    fn push(&self, phase: &'static str) {
        self.phases.lock().unwrap().push(phase);
    }

    fn phases(&self) -> Vec<&'static str> {
        self.phases.lock().unwrap().clone()
    }

    /// Phases with consecutive progress callbacks collapsed to one.
    fn milestones(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for phase in self.phases() {
            if phase.ends_with("progress") && out.last() == Some(&phase) {
                continue;
            }
            out.push(phase);
        }
        out
    }
}

impl EventSink for RecordingSink {
    fn on_before_request(&self) {
        self.push("before_request");
    }
    fn on_request_start(&self) {
        self.push("request_start");
    }
    fn on_request_progress(&self, progress: Progress) {
        self.push("request_progress");
        self.uploads.lock().unwrap().push(progress);
    }
    fn on_request_end(&self) {
        self.push("request_end");
    }
    fn on_response_start(&self) {
        self.push("response_start");
    }
    fn on_response_progress(&self, progress: Progress) {
        self.push("response_progress");
        self.downloads.lock().unwrap().push(progress);
    }
    fn on_success(&self, _envelope: &Envelope) {
        self.push("success");
    }
    fn on_error(&self, _envelope: &Envelope) {
        self.push("error");
    }
    fn on_response_end(&self) {
        self.push("response_end");
    }
    fn on_timeout_error(&self) {
        self.push("timeout_error");
    }
    fn on_abort(&self) {
        self.push("abort");
    }
}

async fn setup() -> (MockServer, HttpExecutor, HttpExecutor) {
    let server = MockServer::start().await;
    let http = reqwest::Client::new();
    (
        server,
        HttpExecutor::buffered(http.clone()),
        HttpExecutor::streaming(http, 4),
    )
}

fn request(server: &MockServer, verb: reqwest::Method, route: &str) -> ResolvedRequest {
    let url = Url::parse(&server.uri()).unwrap().join(route).unwrap();
    ResolvedRequest::new(verb, url, Duration::from_secs(5))
}

// ── Classification ──────────────────────────────────────────────────

#[tokio::test]
async fn test_buffered_success_event_order() {
    let (server, buffered, _) = setup().await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;

    let sink = RecordingSink::default();
    let env = buffered
        .execute(
            &request(&server, reqwest::Method::GET, "/users/1"),
            &sink,
            &CancellationToken::new(),
        )
        .await;

    assert!(env.is_success());
    assert_eq!(env.status(), 200);
    assert_eq!(env.data(), Some(&json!({"id": 1})));
    assert_eq!(
        sink.milestones(),
        vec![
            "before_request",
            "request_start",
            "request_end",
            "response_start",
            "response_progress",
            "success",
            "response_end",
        ]
    );
}

#[tokio::test]
async fn test_redirect_status_counts_as_success() {
    let (server, buffered, streaming) = setup().await;

    Mock::given(method("GET"))
        .and(path("/cached"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;

    for executor in [buffered, streaming] {
        let env = executor
            .execute(
                &request(&server, reqwest::Method::GET, "/cached"),
                &reqflow_api::NoopSink,
                &CancellationToken::new(),
            )
            .await;
        assert!(env.is_success(), "304 should be success: {env:?}");
        assert_eq!(env.status(), 304);
    }
}

#[tokio::test]
async fn test_server_error_carries_body() {
    let (server, buffered, _) = setup().await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"reason": "maintenance"})))
        .mount(&server)
        .await;

    let sink = RecordingSink::default();
    let env = buffered
        .execute(
            &request(&server, reqwest::Method::POST, "/orders"),
            &sink,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(env.status(), 503);
    assert_eq!(
        env.error(),
        Some(&RequestError::Http {
            status: 503,
            body: json!({"reason": "maintenance"}),
        })
    );
    assert!(sink.phases().contains(&"error"));
    assert!(!sink.phases().contains(&"success"));
}

#[tokio::test]
async fn test_connection_refused_is_status_zero() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let executor = HttpExecutor::buffered(reqwest::Client::new());
    let url = Url::parse(&format!("http://{addr}/nowhere")).unwrap();
    let req = ResolvedRequest::new(reqwest::Method::GET, url, Duration::from_secs(5));

    let sink = RecordingSink::default();
    let env = executor.execute(&req, &sink, &CancellationToken::new()).await;

    assert_eq!(env.status(), 0);
    assert!(matches!(env.error(), Some(RequestError::Connection { .. })));
    assert_eq!(sink.phases().last(), Some(&"response_end"));
}

// ── Timeout & abort ─────────────────────────────────────────────────

#[tokio::test]
async fn test_timeout_emits_timeout_then_error() {
    let (server, buffered, _) = setup().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let mut req = request(&server, reqwest::Method::GET, "/slow");
    req.timeout = Duration::from_millis(50);

    let sink = RecordingSink::default();
    let env = buffered.execute(&req, &sink, &CancellationToken::new()).await;

    assert_eq!(env.error(), Some(&RequestError::Timeout { timeout_ms: 50 }));
    let phases = sink.phases();
    let tail = &phases[phases.len() - 3..];
    assert_eq!(tail, &["timeout_error", "error", "response_end"]);
}

#[tokio::test]
async fn test_abort_suppresses_success() {
    let (server, _, streaming) = setup().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let sink = RecordingSink::default();
    let env = streaming
        .execute(&request(&server, reqwest::Method::GET, "/slow"), &sink, &cancel)
        .await;

    assert!(env.is_aborted());
    assert_eq!(env.status(), 0);
    let phases = sink.phases();
    assert_eq!(phases.last(), Some(&"abort"));
    assert!(!phases.contains(&"success"));
    assert!(!phases.contains(&"error"));
}

#[tokio::test]
async fn test_already_cancelled_never_starts() {
    let (server, buffered, _) = setup().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let sink = RecordingSink::default();
    let env = buffered
        .execute(&request(&server, reqwest::Method::GET, "/x"), &sink, &cancel)
        .await;

    assert!(env.is_aborted());
    assert_eq!(sink.phases(), vec!["abort"]);
}

// ── Progress ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_streaming_upload_reports_cumulative_progress() {
    let (server, _, streaming) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/upload"))
        .and(header("content-length", "10"))
        .and(body_string("abcdefghij"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"stored": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut req = request(&server, reqwest::Method::PUT, "/upload");
    req.payload = Some(Payload::Text("abcdefghij".into()));

    let sink = RecordingSink::default();
    let env = streaming.execute(&req, &sink, &CancellationToken::new()).await;

    assert!(env.is_success(), "{env:?}");
    let uploads = sink.uploads.lock().unwrap().clone();
    let loaded: Vec<u64> = uploads.iter().map(|p| p.loaded).collect();
    assert_eq!(loaded, vec![4, 8, 10]);
    assert!(uploads.iter().all(|p| p.total == Some(10)));
    assert_eq!(
        sink.milestones()[..4],
        ["before_request", "request_start", "request_progress", "request_end"]
    );
}

#[tokio::test]
async fn test_buffered_upload_reports_once() {
    let (server, buffered, _) = setup().await;

    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let mut req = request(&server, reqwest::Method::POST, "/items");
    req.payload = Some(Payload::Json(json!({"name": "widget"})));

    let sink = RecordingSink::default();
    let env = buffered.execute(&req, &sink, &CancellationToken::new()).await;

    assert!(env.is_success());
    let uploads = sink.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].loaded, uploads[0].total.unwrap());
}

#[tokio::test]
async fn test_download_progress_reaches_content_length() {
    let (server, _, streaming) = setup().await;
    let body = "x".repeat(2048);

    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .mount(&server)
        .await;

    let sink = RecordingSink::default();
    let env = streaming
        .execute(
            &request(&server, reqwest::Method::GET, "/blob"),
            &sink,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(env.data(), Some(&json!(body)));
    let last = *sink.downloads.lock().unwrap().last().unwrap();
    assert_eq!(last.loaded, 2048);
    assert_eq!(last.total, Some(2048));
}
