//! Google Sheets persistence for the customer-service assistant
//!
//! Provides storage for:
//! - Conversation archive (one tab per routing key)
//! - Feedback-form submissions (fixed 20-column rows)
//! - Analytics over the archived conversations
//! - Connectivity diagnostics
//!
//! When Sheets is not configured, in-memory stores stand in so the chat
//! endpoint keeps working.

pub mod analytics;
pub mod auth;
pub mod conversations;
pub mod credentials;
pub mod diagnostics;
pub mod error;
pub mod feedback;
pub mod sheets;

pub use analytics::{
    build_report, collect_report, is_conversation_sheet, AnalyticsQuery, AnalyticsReport,
    AnalyticsSummary, ArchivedConversation, TimeRange,
};
pub use auth::{TokenProvider, SHEETS_SCOPE};
pub use conversations::{
    ConversationLog, ConversationRecord, InMemoryConversationLog, SheetsConversationLog,
    CONVERSATION_HEADER,
};
pub use credentials::ServiceAccountKey;
pub use diagnostics::{run_diagnostics, DiagnosticStage, DiagnosticsReport};
pub use error::PersistenceError;
pub use feedback::{
    FeedbackStore, FeedbackSubmission, InMemoryFeedbackStore, SheetsFeedbackStore,
    FEEDBACK_COLUMNS,
};
pub use sheets::{a1_range, SheetSummary, SheetsClient, SpreadsheetInfo};

use std::sync::Arc;

use helpdesk_config::SheetsConfig;

/// Initialize the persistence layer
///
/// Uses Google Sheets when a spreadsheet id and credentials are configured;
/// otherwise falls back to in-memory stores. Invalid credentials are an error
/// rather than a silent fallback.
pub fn init(config: &SheetsConfig) -> Result<PersistenceLayer, PersistenceError> {
    if !config.is_configured() {
        tracing::warn!("Google Sheets is not configured, conversations and feedback are kept in memory");
        return Ok(PersistenceLayer::in_memory());
    }

    let client = SheetsClient::from_config(config)?;
    Ok(PersistenceLayer {
        conversations: Arc::new(SheetsConversationLog::new(client.clone())),
        feedback: Arc::new(SheetsFeedbackStore::new(client.clone(), &config.feedback_sheet)),
        sheets: Some(client),
    })
}

/// Combined persistence layer with all services
#[derive(Clone)]
pub struct PersistenceLayer {
    pub conversations: Arc<dyn ConversationLog>,
    pub feedback: Arc<dyn FeedbackStore>,
    /// Present only when backed by Google Sheets
    pub sheets: Option<SheetsClient>,
}

impl PersistenceLayer {
    pub fn in_memory() -> Self {
        Self {
            conversations: Arc::new(InMemoryConversationLog::new()),
            feedback: Arc::new(InMemoryFeedbackStore::new()),
            sheets: None,
        }
    }
}
