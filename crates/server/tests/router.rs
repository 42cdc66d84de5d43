//! Router-level tests
//!
//! Drive the full axum router with a stub completion backend and in-memory
//! stores; no network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

use helpdesk_config::{builtin_registry, Settings};
use helpdesk_llm::{
    CompletionBackend, CompletionConfig, CompletionRequest, CompletionResult, FlowiseBackend,
    LlmError,
};
use helpdesk_persistence::{
    ConversationLog, ConversationRecord, InMemoryConversationLog, InMemoryFeedbackStore,
    PersistenceError, PersistenceLayer,
};
use helpdesk_server::{create_router, AppState};

/// Answers with a fixed reply, or fails with an upstream status
struct StubBackend {
    outcome: Result<String, u16>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl StubBackend {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(status),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionBackend for StubBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, LlmError> {
        self.seen.lock().push(request.clone());
        match &self.outcome {
            Ok(text) => Ok(CompletionResult {
                text: text.clone(),
                fallback: false,
                total_time_ms: 1,
                attempts: 1,
            }),
            Err(status) => Err(LlmError::Api {
                status: *status,
                message: "upstream said no".to_string(),
            }),
        }
    }

    async fn is_available(&self) -> bool {
        self.outcome.is_ok()
    }

    fn endpoint(&self) -> &str {
        "stub://flowise"
    }
}

/// Archive that always fails
struct BrokenLog;

#[async_trait]
impl ConversationLog for BrokenLog {
    async fn append(&self, _: &str, _: &ConversationRecord) -> Result<(), PersistenceError> {
        Err(PersistenceError::Network("connection reset".to_string()))
    }

    async fn read_all(&self, _: &str) -> Result<Vec<ConversationRecord>, PersistenceError> {
        Err(PersistenceError::Network("connection reset".to_string()))
    }

    async fn sheet_names(&self) -> Result<Vec<String>, PersistenceError> {
        Err(PersistenceError::Network("connection reset".to_string()))
    }

    fn backend(&self) -> &'static str {
        "broken"
    }
}

/// Never answers
struct HangingBackend;

#[async_trait]
impl CompletionBackend for HangingBackend {
    async fn complete(&self, _: &CompletionRequest) -> Result<CompletionResult, LlmError> {
        std::future::pending().await
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn endpoint(&self) -> &str {
        "stub://hanging"
    }
}

struct Harness {
    app: Router,
    backend: Arc<StubBackend>,
    log: Arc<InMemoryConversationLog>,
    feedback: Arc<InMemoryFeedbackStore>,
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.sheets.spreadsheet_id = String::new();
    settings.sheets.credentials_json = None;
    settings.sheets.client_email = None;
    settings.sheets.private_key = None;
    settings.server.auth.enabled = false;
    settings
}

fn app_with(
    backend: Arc<dyn CompletionBackend>,
    settings: Settings,
) -> (Router, Arc<InMemoryConversationLog>, Arc<InMemoryFeedbackStore>) {
    let log = Arc::new(InMemoryConversationLog::new());
    let feedback = Arc::new(InMemoryFeedbackStore::new());
    let persistence = PersistenceLayer {
        conversations: log.clone(),
        feedback: feedback.clone(),
        sheets: None,
    };
    let state = AppState::new(
        settings,
        Arc::new(builtin_registry().unwrap()),
        backend,
        persistence,
    );
    (create_router(state), log, feedback)
}

fn harness_with(backend: Arc<StubBackend>, settings: Settings) -> Harness {
    let (app, log, feedback) = app_with(backend.clone(), settings);
    Harness {
        app,
        backend,
        log,
        feedback,
    }
}

fn harness() -> Harness {
    harness_with(StubBackend::replying("Happy to help!"), settings())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn chat_classifies_answers_and_archives() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        post_json(
            "/api/chat",
            json!({
                "message": "My brake is making noise",
                "companyId": "honda",
                "chatHistory": [
                    {"message": "Hi", "isUser": true},
                    {"message": "Hello!", "isUser": false}
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Happy to help!");
    assert_eq!(body["intent"], "service");
    assert_eq!(body["company"], "honda");
    assert_eq!(body["sheetName"], "Service_Conversations");

    let seen = h.backend.seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].question, "My brake is making noise");
    assert_eq!(seen[0].history.len(), 2);
    assert!(seen[0].system_message.starts_with("You are a Honda service advisor"));

    let archived = h.log.read_all("Service_Conversations").await.unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].company, "honda");
    assert_eq!(archived[0].intent, "service");
    assert_eq!(archived[0].ai_response, "Happy to help!");
}

#[tokio::test]
async fn chat_detects_company_from_message() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        post_json("/api/chat", json!({"message": "Does my Toyota need an oil change?"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["company"], "toyota");
    assert_eq!(body["sheetName"], "Toyota_Service");
}

#[tokio::test]
async fn chat_without_message_is_rejected() {
    let h = harness();
    for payload in [json!({}), json!({"message": ""}), json!({"message": null})] {
        let (status, body) = send(&h.app, post_json("/api/chat", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message is required");
    }
    assert!(h.backend.seen.lock().is_empty());
}

#[tokio::test]
async fn chat_with_wrong_types_is_rejected() {
    let h = harness();
    let (status, _) = send(&h.app, post_json("/api/chat", json!({"message": 7}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h.app,
        post_json("/api/chat", json!({"message": "hi", "companyId": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_upstream_failure_keeps_status() {
    let h = harness_with(StubBackend::failing(401), settings());
    let (status, body) = send(&h.app, post_json("/api/chat", json!({"message": "buy a car"}))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Failed to get response from AI");
    assert!(h.log.is_empty());
}

#[tokio::test]
async fn chat_survives_archive_failure() {
    let backend = StubBackend::replying("Sure");
    let persistence = PersistenceLayer {
        conversations: Arc::new(BrokenLog),
        feedback: Arc::new(InMemoryFeedbackStore::new()),
        sheets: None,
    };
    let state = AppState::new(
        settings(),
        Arc::new(builtin_registry().unwrap()),
        backend,
        persistence,
    );
    let app = create_router(state);

    let (status, body) = send(&app, post_json("/api/chat", json!({"message": "test drive"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "sales");
}

#[tokio::test]
async fn record_chat_uses_default_sheet() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        post_json(
            "/api/record-chat",
            json!({"userMessage": "hello", "aiResponse": "hi there", "timestamp": "2024-06-01T00:00:00Z"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let rows = h.log.read_all("Conversations").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, "2024-06-01T00:00:00Z");
    assert_eq!(rows[0].company, "honda");
    assert_eq!(rows[0].intent, "general");

    let (status, body) = send(
        &h.app,
        post_json("/api/record-chat", json!({"userMessage": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message and response are required");
}

#[tokio::test]
async fn conversations_are_newest_first() {
    let h = harness();
    for i in 0..3 {
        let record = ConversationRecord::new("honda", "sales", format!("q{}", i), "a");
        h.log.append("Sales_Conversations", &record).await.unwrap();
    }

    let (status, body) = send(&h.app, get("/api/conversations?sheet=Sales_Conversations&limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["conversations"][0]["userMessage"], "q2");
    assert_eq!(body["conversations"][1]["userMessage"], "q1");
}

#[tokio::test]
async fn analytics_aggregates_conversation_tabs() {
    let h = harness();
    send(&h.app, post_json("/api/chat", json!({"message": "price of a new car"}))).await;
    send(&h.app, post_json("/api/chat", json!({"message": "my Toyota battery is dead"}))).await;
    h.log.create_tab("Calls");

    let (status, body) = send(&h.app, get("/api/analytics?timeRange=7days")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analytics"]["totalConversations"], 2);
    assert_eq!(body["analytics"]["intentBreakdown"]["sales"], 1);
    assert_eq!(body["analytics"]["companyBreakdown"]["toyota"], 1);

    let (_, body) = send(&h.app, get("/api/analytics?company=Toyota")).await;
    assert_eq!(body["analytics"]["totalConversations"], 1);
    assert_eq!(body["conversations"][0]["sheetName"], "Toyota_Service");

    let (status, _) = send(&h.app, get("/api/analytics?timeRange=forever")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feedback_is_validated_and_stored() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        post_json(
            "/api/feedback",
            json!({
                "process": "service",
                "name": "Asha",
                "phone": "9876543210",
                "location": "Indiranagar",
                "serviceQuality": "poor"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["escalated"], true);

    let rows = h.feedback.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), 20);
    assert_eq!(rows[0][17], "YES");
    assert_eq!(rows[0][19], "New");

    let (status, body) = send(
        &h.app,
        post_json("/api/feedback", json!({"process": "service", "name": "A"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(h.feedback.rows().len(), 1);
}

#[tokio::test]
async fn companies_lists_registry() {
    let h = harness();
    let (status, body) = send(&h.app, get("/api/companies")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["default"], "honda");
    assert_eq!(body["companies"][1]["id"], "toyota");
    assert_eq!(body["companies"][0]["intents"][0], "sales");
}

fn with_bearer(mut request: Request<Body>, key: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", key).parse().unwrap(),
    );
    request
}

#[tokio::test]
async fn diagnostics_reports_first_failing_stage() {
    let mut settings = settings();
    settings.server.auth.api_key = Some("s3cret".to_string());
    let h = harness_with(StubBackend::replying("ok"), settings);

    let (status, body) = send(&h.app, with_bearer(get("/api/diagnostics"), "s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["stage"], "credentials-check");
}

#[tokio::test]
async fn admin_routes_need_key_with_auth_disabled() {
    let h = harness();
    let (status, body) = send(&h.app, get("/api/diagnostics")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("api_key"));

    let (status, _) = send(&h.app, post_json("/admin/reload-config", json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Regular API stays open
    let (status, _) = send(&h.app, get("/api/companies")).await;
    assert_eq!(status, StatusCode::OK);

    let mut settings = settings();
    settings.server.auth.api_key = Some("s3cret".to_string());
    let keyed = harness_with(StubBackend::replying("ok"), settings);
    let (status, _) = send(&keyed.app, get("/api/diagnostics")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&keyed.app, with_bearer(get("/api/diagnostics"), "wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = get("/api/diagnostics");
    request
        .headers_mut()
        .insert("x-api-key", "s3cret".parse().unwrap());
    let (status, _) = send(&keyed.app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn chat_times_out_inside_request_deadline() {
    let mut settings = settings();
    settings.server.timeout_seconds = 1;
    let (app, log, _) = app_with(Arc::new(HangingBackend), settings);

    let (status, body) = send(&app, post_json("/api/chat", json!({"message": "hello"}))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "Failed to get response from AI");
    assert!(log.sheet_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn silent_flowise_exhausts_retries_before_request_deadline() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    let backend = FlowiseBackend::new(CompletionConfig {
        endpoint: format!("http://{}/api/v1/prediction/flow", addr),
        api_key: None,
        timeout: Duration::from_millis(200),
        max_retries: 2,
        initial_backoff: Duration::from_millis(10),
    })
    .unwrap();
    let mut settings = settings();
    settings.server.timeout_seconds = 5;
    let (app, _, _) = app_with(Arc::new(backend), settings);

    let started = Instant::now();
    let (status, body) = send(&app, post_json("/api/chat", json!({"message": "hello"}))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "Failed to get response from AI");
    assert!(started.elapsed() < Duration::from_secs(5));

    let all_attempts = tokio::time::timeout(Duration::from_secs(2), async {
        while accepted.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(all_attempts.is_ok());
}

#[tokio::test]
async fn health_and_readiness() {
    let h = harness();
    let (status, body) = send(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["archive"]["backend"], "in-memory");

    let (status, body) = send(&h.app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["sheets"]["status"], "in_memory");

    let down = harness_with(StubBackend::failing(500), settings());
    let (status, _) = send(&down.app, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn api_key_required_when_auth_enabled() {
    let mut settings = settings();
    settings.server.auth.enabled = true;
    settings.server.auth.api_key = Some("s3cret".to_string());
    let h = harness_with(StubBackend::replying("ok"), settings);

    let (status, _) = send(&h.app, post_json("/api/chat", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = post_json("/api/chat", json!({"message": "hi"}));
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}
