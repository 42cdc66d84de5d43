//! Conversation archive
//!
//! Each classified exchange is appended as one row to the tab named by the
//! intent's routing key. Tabs are created on first use with a header row.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::sheets::{a1_range, SheetsClient};
use crate::PersistenceError;

pub const CONVERSATION_HEADER: [&str; 5] =
    ["Timestamp", "Company", "Intent", "User Message", "AI Response"];

const CONVERSATION_COLUMNS: &str = "A:E";

/// One archived exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// RFC 3339 when written by this service; free text when read back
    pub timestamp: String,
    pub company: String,
    pub intent: String,
    pub user_message: String,
    pub ai_response: String,
}

impl ConversationRecord {
    pub fn new(
        company: impl Into<String>,
        intent: impl Into<String>,
        user_message: impl Into<String>,
        ai_response: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            company: company.into(),
            intent: intent.into(),
            user_message: user_message.into(),
            ai_response: ai_response.into(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.company.clone(),
            self.intent.clone(),
            self.user_message.clone(),
            self.ai_response.clone(),
        ]
    }

    /// Parse a stored row; blank company/intent cells take the given defaults
    pub fn from_row(row: &[String], default_company: &str, default_intent: &str) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        let or_default = |value: String, default: &str| {
            if value.is_empty() {
                default.to_string()
            } else {
                value
            }
        };
        Self {
            timestamp: cell(0),
            company: or_default(cell(1), default_company),
            intent: or_default(cell(2), default_intent),
            user_message: cell(3),
            ai_response: cell(4),
        }
    }
}

/// Conversation archive backend
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// Append one record to `sheet`, creating the tab when absent
    async fn append(&self, sheet: &str, record: &ConversationRecord) -> Result<(), PersistenceError>;

    /// All records of `sheet` in insertion order (empty when the tab is missing)
    async fn read_all(&self, sheet: &str) -> Result<Vec<ConversationRecord>, PersistenceError>;

    /// Names of every tab in the archive
    async fn sheet_names(&self) -> Result<Vec<String>, PersistenceError>;

    /// Newest first, at most `limit`
    async fn recent(
        &self,
        sheet: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, PersistenceError> {
        let mut records = self.read_all(sheet).await?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;
}

/// Tabs known to exist, with one creation lock per tab
///
/// Concurrent first writes to the same tab wait for a single creator instead
/// of each issuing `addSheet`.
#[derive(Default)]
struct TabRegistry {
    known: Mutex<HashSet<String>>,
    creating: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TabRegistry {
    fn is_known(&self, sheet: &str) -> bool {
        self.known.lock().contains(sheet)
    }

    fn creation_lock(&self, sheet: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.creating
            .lock()
            .entry(sheet.to_string())
            .or_default()
            .clone()
    }

    /// Run `create` at most once per tab; it returns every tab title it saw
    async fn ensure<F, Fut>(&self, sheet: &str, create: F) -> Result<(), PersistenceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, PersistenceError>>,
    {
        if self.is_known(sheet) {
            return Ok(());
        }

        let lock = self.creation_lock(sheet);
        let _creating = lock.lock().await;
        if self.is_known(sheet) {
            return Ok(());
        }

        let titles = create().await?;
        let mut known = self.known.lock();
        known.extend(titles);
        known.insert(sheet.to_string());
        Ok(())
    }
}

/// Archive stored in a Google spreadsheet
pub struct SheetsConversationLog {
    client: SheetsClient,
    tabs: TabRegistry,
}

impl SheetsConversationLog {
    pub fn new(client: SheetsClient) -> Self {
        Self {
            client,
            tabs: TabRegistry::default(),
        }
    }

    async fn ensure_tab(&self, sheet: &str) -> Result<(), PersistenceError> {
        self.tabs
            .ensure(sheet, move || async move {
                let titles = self.client.sheet_titles().await?;
                if titles.iter().any(|t| t == sheet) {
                    return Ok(titles);
                }

                match self.client.add_sheet(sheet).await {
                    Ok(()) => {
                        let header = CONVERSATION_HEADER.iter().map(|h| h.to_string()).collect();
                        self.client
                            .update_values(&a1_range(sheet, "A1:E1"), vec![header])
                            .await?;
                    }
                    // Another process created it between listing and adding
                    Err(e) if e.is_duplicate_sheet() => {
                        tracing::debug!(sheet = %sheet, "Sheet created concurrently");
                    }
                    Err(e) => return Err(e),
                }
                Ok::<_, PersistenceError>(titles)
            })
            .await
    }
}

#[async_trait]
impl ConversationLog for SheetsConversationLog {
    async fn append(&self, sheet: &str, record: &ConversationRecord) -> Result<(), PersistenceError> {
        self.ensure_tab(sheet).await?;
        self.client
            .append_values(&a1_range(sheet, CONVERSATION_COLUMNS), vec![record.to_row()])
            .await?;
        tracing::debug!(sheet = %sheet, intent = %record.intent, "Archived conversation");
        Ok(())
    }

    async fn read_all(&self, sheet: &str) -> Result<Vec<ConversationRecord>, PersistenceError> {
        let rows = match self
            .client
            .get_values(&a1_range(sheet, CONVERSATION_COLUMNS))
            .await
        {
            Ok(rows) => rows,
            // Sheets answers 400 "Unable to parse range" for a missing tab
            Err(PersistenceError::Api { status: 400, .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(rows
            .iter()
            .skip(1)
            .map(|row| {
                ConversationRecord::from_row(
                    row,
                    helpdesk_config::DEFAULT_COMPANY,
                    helpdesk_core::IntentTag::General.as_str(),
                )
            })
            .collect())
    }

    async fn sheet_names(&self) -> Result<Vec<String>, PersistenceError> {
        self.client.sheet_titles().await
    }

    fn backend(&self) -> &'static str {
        "google-sheets"
    }
}

/// Process-local archive used when Sheets is not configured, and in tests
#[derive(Default)]
pub struct InMemoryConversationLog {
    tabs: RwLock<BTreeMap<String, Vec<ConversationRecord>>>,
}

impl InMemoryConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tab, as a human might in the spreadsheet UI
    pub fn create_tab(&self, sheet: &str) {
        self.tabs.write().entry(sheet.to_string()).or_default();
    }

    pub fn len(&self) -> usize {
        self.tabs.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn append(&self, sheet: &str, record: &ConversationRecord) -> Result<(), PersistenceError> {
        self.tabs
            .write()
            .entry(sheet.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn read_all(&self, sheet: &str) -> Result<Vec<ConversationRecord>, PersistenceError> {
        Ok(self.tabs.read().get(sheet).cloned().unwrap_or_default())
    }

    async fn sheet_names(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.tabs.read().keys().cloned().collect())
    }

    fn backend(&self) -> &'static str {
        "in-memory"
    }
}
