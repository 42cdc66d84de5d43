//! HTTP Endpoints
//!
//! REST API for the customer-service assistant.

use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, Json, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Router,
};
use helpdesk_agent::ChatRequest;
use helpdesk_core::IntentTag;
use helpdesk_llm::{CompletionRequest, LlmError};
use helpdesk_persistence::{
    collect_report, run_diagnostics, AnalyticsQuery, ConversationRecord, FeedbackSubmission,
    TimeRange,
};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::metrics::{
    metrics_handler, record_archive_failure, record_chat_request, record_completion_error,
    record_completion_latency, record_feedback,
};
use crate::state::AppState;
use crate::ServerError;

const DEFAULT_CONVERSATION_LIMIT: usize = 100;
const CHECK_TIMEOUT: Duration = Duration::from_secs(2);
/// Left for archiving and the response once the completion deadline passes
const COMPLETION_HEADROOM: Duration = Duration::from_millis(500);

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.read();
    let cors_layer = build_cors_layer(&config.server.cors_origins, config.server.cors_enabled);
    let request_timeout = Duration::from_secs(config.server.timeout_seconds);
    drop(config); // Release lock before building router

    Router::new()
        // Assistant
        .route("/api/chat", post(chat))
        .route("/api/record-chat", post(record_chat))
        .route("/api/conversations", get(list_conversations))
        .route("/api/analytics", get(analytics))
        .route("/api/companies", get(list_companies))
        // Feedback form
        .route("/api/feedback", post(submit_feedback))
        // Sheets diagnostics
        .route("/api/diagnostics", get(diagnostics))
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // Admin endpoints
        .route("/admin/reload-config", post(reload_config))
        // Middleware (order matters - auth runs after CORS but before handlers)
        .layer(axum::middleware::from_fn(auth_middleware))
        .layer(Extension(state.config.clone()))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If cors_origins is empty, defaults to localhost:3000
/// - Otherwise, uses the configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let localhost = || {
        CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };

    if origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return localhost();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("All configured CORS origins are invalid, falling back to localhost");
        return localhost();
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

fn json_body(body: Result<Json<serde_json::Value>, JsonRejection>) -> Result<serde_json::Value, ServerError> {
    body.map(|Json(value)| value)
        .map_err(|e| ServerError::InvalidRequest(e.body_text()))
}

/// Chat response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    response: String,
    intent: IntentTag,
    company: String,
    sheet_name: String,
}

/// POST /api/chat
///
/// Classify, ask the completion service with the intent's system prompt,
/// then archive the exchange. Archive failures are logged, not returned.
async fn chat(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, ServerError> {
    let request = ChatRequest::from_value(&json_body(body)?)?;
    if !request.has_message() {
        return Err(ServerError::InvalidRequest("Message is required".to_string()));
    }

    let classified = state
        .classifier
        .classify(&request.message, request.company_id.as_deref());
    record_chat_request(&classified.company_id, classified.intent.as_str());

    let completion = CompletionRequest {
        question: request.message.clone(),
        history: request.chat_history,
        system_message: classified.prompt_template.clone(),
    };

    let deadline = completion_deadline(state.get_config().server.timeout_seconds);
    let started = Instant::now();
    let result = tokio::time::timeout(deadline, state.completion.complete(&completion))
        .await
        .unwrap_or(Err(LlmError::Timeout))
        .map_err(|e| {
            tracing::error!(
                error = %e,
                company = %classified.company_id,
                intent = %classified.intent,
                "Completion service error"
            );
            record_completion_error(completion_error_kind(&e));
            ServerError::from(e)
        })?;
    record_completion_latency(started.elapsed());

    let record = ConversationRecord::new(
        &classified.company_id,
        classified.intent.as_str(),
        &request.message,
        &result.text,
    );
    if let Err(e) = state
        .conversations
        .append(&classified.routing_key, &record)
        .await
    {
        tracing::warn!(
            error = %e,
            sheet = %classified.routing_key,
            "Failed to archive conversation"
        );
        record_archive_failure(&classified.routing_key);
    }

    Ok(Json(ChatResponse {
        response: result.text,
        intent: classified.intent,
        company: classified.company_id,
        sheet_name: classified.routing_key,
    }))
}

/// Completion budget inside the route timeout
fn completion_deadline(request_timeout_seconds: u64) -> Duration {
    let request_timeout = Duration::from_secs(request_timeout_seconds);
    request_timeout
        .checked_sub(COMPLETION_HEADROOM)
        .filter(|d| !d.is_zero())
        .unwrap_or(request_timeout / 2)
}

fn completion_error_kind(err: &LlmError) -> &'static str {
    match err {
        LlmError::Api { .. } => "api",
        LlmError::Network(_) => "network",
        LlmError::InvalidResponse(_) => "invalid_response",
        LlmError::Timeout => "timeout",
        LlmError::Configuration(_) => "configuration",
    }
}

/// Record-chat request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RecordChatRequest {
    user_message: String,
    ai_response: String,
    timestamp: Option<String>,
    company: Option<String>,
    intent: Option<String>,
    sheet_name: Option<String>,
}

/// POST /api/record-chat
async fn record_chat(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let request: RecordChatRequest = serde_json::from_value(json_body(body)?)
        .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

    if request.user_message.is_empty() || request.ai_response.is_empty() {
        return Err(ServerError::InvalidRequest(
            "Message and response are required".to_string(),
        ));
    }

    let sheet = request.sheet_name.filter(|s| !s.is_empty()).unwrap_or_else(|| {
        state.get_config().sheets.default_conversation_sheet.clone()
    });
    let company = request
        .company
        .unwrap_or_else(|| state.registry().default_profile().id.clone());
    let intent = request
        .intent
        .unwrap_or_else(|| IntentTag::General.as_str().to_string());

    let mut record = ConversationRecord::new(company, intent, request.user_message, request.ai_response);
    if let Some(timestamp) = request.timestamp.filter(|t| !t.is_empty()) {
        record = record.with_timestamp(timestamp);
    }

    state
        .conversations
        .append(&sheet, &record)
        .await
        .map_err(|e| ServerError::from_persistence(e, "Failed to record chat"))?;

    Ok(Json(serde_json::json!({ "success": true, "sheetName": sheet })))
}

#[derive(Debug, Deserialize)]
struct ConversationsQuery {
    sheet: Option<String>,
    limit: Option<usize>,
}

/// GET /api/conversations?sheet=&limit=
async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ConversationsQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let sheet = query.sheet.filter(|s| !s.is_empty()).unwrap_or_else(|| {
        state.get_config().sheets.default_conversation_sheet.clone()
    });
    let limit = query.limit.unwrap_or(DEFAULT_CONVERSATION_LIMIT);

    let conversations = state
        .conversations
        .recent(&sheet, limit)
        .await
        .map_err(|e| ServerError::from_persistence(e, "Failed to fetch conversations"))?;

    Ok(Json(serde_json::json!({
        "sheetName": sheet,
        "count": conversations.len(),
        "conversations": conversations,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsParams {
    time_range: Option<String>,
    company: Option<String>,
}

/// GET /api/analytics?timeRange=&company=
async fn analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<helpdesk_persistence::AnalyticsReport>, ServerError> {
    let time_range: TimeRange = params
        .time_range
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(|e| ServerError::from_persistence(e, "Failed to fetch analytics data"))?;
    let query = AnalyticsQuery::new(time_range, params.company.as_deref());
    let feedback_sheet = state.get_config().sheets.feedback_sheet.clone();

    let report = collect_report(state.conversations.as_ref(), &feedback_sheet, &query)
        .await
        .map_err(|e| ServerError::from_persistence(e, "Failed to fetch analytics data"))?;

    Ok(Json(report))
}

/// GET /api/companies
async fn list_companies(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registry = state.registry();
    let default_id = registry.default_profile().id.clone();
    let companies: Vec<serde_json::Value> = registry
        .iter()
        .map(|profile| {
            serde_json::json!({
                "id": profile.id,
                "name": profile.display_name,
                "default": profile.id == default_id,
                "intents": profile.rules().iter().map(|r| r.intent).collect::<Vec<_>>(),
                "routingKeys": profile.rules().iter().map(|r| r.routing_key.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "default": default_id,
        "companies": companies,
    }))
}

/// POST /api/feedback
async fn submit_feedback(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let submission: FeedbackSubmission = serde_json::from_value(json_body(body)?)
        .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

    let escalated = state
        .feedback
        .submit(&submission)
        .await
        .map_err(|e| ServerError::from_persistence(e, "Failed to submit feedback"))?;
    record_feedback(escalated);

    Ok(Json(serde_json::json!({ "success": true, "escalated": escalated })))
}

/// GET /api/diagnostics
///
/// Always 200; the body says which stage failed.
async fn diagnostics(State(state): State<AppState>) -> Json<helpdesk_persistence::DiagnosticsReport> {
    // Clone before awaiting - parking_lot guards aren't Send
    let sheets = state.get_config().sheets.clone();
    Json(run_diagnostics(&sheets).await)
}

/// Liveness plus a summary of what the process was started with
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let registry = state.registry();
    let mut checks = serde_json::Map::new();

    checks.insert(
        "registry".to_string(),
        serde_json::json!({
            "status": if registry.is_empty() { "empty" } else { "ok" },
            "companies": registry.len(),
            "default": registry.default_profile().id,
        }),
    );
    checks.insert(
        "archive".to_string(),
        serde_json::json!({
            "status": "ok",
            "backend": state.conversations.backend(),
        }),
    );
    checks.insert(
        "feedback".to_string(),
        serde_json::json!({
            "status": "ok",
            "backend": state.feedback.backend(),
        }),
    );
    checks.insert(
        "completion".to_string(),
        serde_json::json!({
            "status": "ok",
            "endpoint": state.completion.endpoint(),
        }),
    );

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "checks": checks
        })),
    )
}

/// Readiness: completion service and spreadsheet reachable
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();
    let mut ready = true;

    let completion_status =
        match tokio::time::timeout(CHECK_TIMEOUT, state.completion.is_available()).await {
            Ok(true) => "ok",
            Ok(false) => {
                ready = false;
                "unreachable"
            }
            Err(_) => {
                ready = false;
                "timeout"
            }
        };
    checks.insert(
        "completion".to_string(),
        serde_json::json!({
            "status": completion_status,
            "endpoint": state.completion.endpoint(),
        }),
    );

    let sheets_status = match &state.sheets {
        None => "in_memory",
        Some(client) => match tokio::time::timeout(CHECK_TIMEOUT, client.spreadsheet_info()).await {
            Ok(Ok(_)) => "ok",
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Spreadsheet not reachable");
                ready = false;
                "error"
            }
            Err(_) => {
                ready = false;
                "timeout"
            }
        },
    };
    checks.insert(
        "sheets".to_string(),
        serde_json::json!({ "status": sheets_status }),
    );

    let status = if ready { "ready" } else { "not_ready" };
    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "checks": checks
        })),
    )
}

/// POST /admin/reload-config
///
/// Reloads configuration from disk. CORS and the request timeout are only
/// applied at startup.
async fn reload_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.reload_config() {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Configuration reloaded successfully"
            })),
        ),
        Err(e) => {
            tracing::error!("Config reload failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "status": "error",
                    "message": e
                })),
            )
        }
    }
}
