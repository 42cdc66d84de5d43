//! Customer feedback form
//!
//! Survey answers are written as one fixed-layout row (columns `A:T`) to the
//! feedback tab. The column order matches the call-centre sheet the form was
//! built for, so it must not change.

use async_trait::async_trait;
use helpdesk_core::IntentTag;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::sheets::{a1_range, SheetsClient};
use crate::PersistenceError;

pub const FEEDBACK_COLUMNS: usize = 20;

const FEEDBACK_RANGE: &str = "A:T";
const POOR: &str = "poor";

/// Processes a customer can leave feedback about
const FEEDBACK_PROCESSES: [IntentTag; 4] =
    [IntentTag::Sales, IntentTag::Service, IntentTag::Insurance, IntentTag::Amc];

/// Submitted survey
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackSubmission {
    pub process: String,
    pub name: String,
    pub phone: String,
    pub vehicle_number: Option<String>,
    pub location: String,

    // Service questions
    pub job_card_explained: Option<String>,
    pub advisor_behavior: Option<String>,
    pub additional_work_explained: Option<String>,
    pub estimate_provided: Option<String>,
    pub service_quality: Option<String>,
    pub vehicle_cleanliness: Option<String>,
    pub bill_explained: Option<String>,
    pub delivered_on_time: Option<String>,
    pub job_confirmation: Option<String>,
    pub delivery_call: Option<String>,

    // Sales questions
    pub sales_experience: Option<String>,
    pub sales_person_behavior: Option<String>,

    pub additional_feedback: Option<String>,
    /// Client-side timestamp; the server's clock is used when absent
    pub timestamp: Option<String>,
    pub needs_escalation: bool,
}

impl FeedbackSubmission {
    pub fn validate(&self) -> Result<(), PersistenceError> {
        let process_ok = FEEDBACK_PROCESSES
            .iter()
            .any(|p| p.as_str() == self.process.as_str());
        if !process_ok {
            return Err(PersistenceError::InvalidInput(
                "Please select a process".to_string(),
            ));
        }
        if self.name.trim().chars().count() < 2 {
            return Err(PersistenceError::InvalidInput(
                "Name must be at least 2 characters".to_string(),
            ));
        }
        if self.phone.trim().chars().count() < 10 {
            return Err(PersistenceError::InvalidInput(
                "Please enter a valid phone number".to_string(),
            ));
        }
        if self.location.trim().chars().count() < 2 {
            return Err(PersistenceError::InvalidInput(
                "Please enter your location".to_string(),
            ));
        }
        Ok(())
    }

    /// Flagged by the client, or any rating is "poor"
    pub fn escalation_required(&self) -> bool {
        self.needs_escalation
            || [
                &self.advisor_behavior,
                &self.service_quality,
                &self.vehicle_cleanliness,
                &self.sales_experience,
                &self.sales_person_behavior,
            ]
            .iter()
            .any(|rating| rating.as_deref() == Some(POOR))
    }

    /// Sheet row; `S.no` is left blank for the sheet to fill
    pub fn to_row(&self, timestamp: &str) -> Vec<String> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            String::new(),
            self.name.clone(),
            self.phone.clone(),
            text(&self.vehicle_number),
            self.location.clone(),
            text(&self.job_card_explained),
            text(&self.advisor_behavior),
            text(&self.additional_work_explained),
            text(&self.estimate_provided),
            text(&self.service_quality),
            self.location.clone(),
            text(&self.vehicle_cleanliness),
            text(&self.bill_explained),
            text(&self.delivered_on_time),
            text(&self.job_confirmation),
            text(&self.delivery_call),
            text(&self.additional_feedback),
            if self.escalation_required() { "YES" } else { "NO" }.to_string(),
            timestamp.to_string(),
            "New".to_string(),
        ]
    }

    pub fn row_now(&self) -> Vec<String> {
        let timestamp = self
            .timestamp
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
        self.to_row(&timestamp)
    }
}

/// Feedback sink
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Validate and store one submission; returns whether it was escalated
    async fn submit(&self, submission: &FeedbackSubmission) -> Result<bool, PersistenceError>;

    fn backend(&self) -> &'static str;
}

/// Feedback appended to a spreadsheet tab
pub struct SheetsFeedbackStore {
    client: SheetsClient,
    sheet: String,
}

impl SheetsFeedbackStore {
    pub fn new(client: SheetsClient, sheet: impl Into<String>) -> Self {
        Self {
            client,
            sheet: sheet.into(),
        }
    }
}

#[async_trait]
impl FeedbackStore for SheetsFeedbackStore {
    async fn submit(&self, submission: &FeedbackSubmission) -> Result<bool, PersistenceError> {
        submission.validate()?;
        let escalated = submission.escalation_required();
        self.client
            .append_values(&a1_range(&self.sheet, FEEDBACK_RANGE), vec![submission.row_now()])
            .await?;
        tracing::info!(
            sheet = %self.sheet,
            process = %submission.process,
            escalated,
            "Feedback recorded"
        );
        Ok(escalated)
    }

    fn backend(&self) -> &'static str {
        "google-sheets"
    }
}

/// Keeps rows in memory
#[derive(Default)]
pub struct InMemoryFeedbackStore {
    rows: RwLock<Vec<Vec<String>>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.read().clone()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn submit(&self, submission: &FeedbackSubmission) -> Result<bool, PersistenceError> {
        submission.validate()?;
        self.rows.write().push(submission.row_now());
        Ok(submission.escalation_required())
    }

    fn backend(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> FeedbackSubmission {
        FeedbackSubmission {
            process: "service".to_string(),
            name: "Asha".to_string(),
            phone: "9876543210".to_string(),
            vehicle_number: Some("KA01AB1234".to_string()),
            location: "Koramangala".to_string(),
            job_card_explained: Some("yes".to_string()),
            advisor_behavior: Some("good".to_string()),
            service_quality: Some("excellent".to_string()),
            additional_feedback: Some("Quick turnaround".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_row_layout() {
        let row = submission().to_row("2024-05-01T10:00:00Z");
        assert_eq!(row.len(), FEEDBACK_COLUMNS);
        assert_eq!(row[0], "");
        assert_eq!(row[1], "Asha");
        assert_eq!(row[3], "KA01AB1234");
        assert_eq!(row[4], "Koramangala");
        assert_eq!(row[5], "yes");
        assert_eq!(row[10], "Koramangala");
        assert_eq!(row[16], "Quick turnaround");
        assert_eq!(row[17], "NO");
        assert_eq!(row[18], "2024-05-01T10:00:00Z");
        assert_eq!(row[19], "New");
    }

    #[test]
    fn test_poor_rating_escalates() {
        let mut s = submission();
        assert!(!s.escalation_required());
        s.vehicle_cleanliness = Some("poor".to_string());
        assert!(s.escalation_required());
        assert_eq!(s.to_row("t")[17], "YES");

        let mut flagged = submission();
        flagged.needs_escalation = true;
        assert!(flagged.escalation_required());
    }

    #[test]
    fn test_validation() {
        assert!(submission().validate().is_ok());

        let mut s = submission();
        s.process = "complaint".to_string();
        assert!(s.validate().is_err());

        let mut s = submission();
        s.phone = "12345".to_string();
        assert!(s.validate().is_err());

        let mut s = submission();
        s.name = "A".to_string();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_body() {
        let s: FeedbackSubmission = serde_json::from_str(
            r#"{"process":"sales","name":"Ravi","phone":"9000000000","location":"Pune","salesExperience":"poor"}"#,
        )
        .unwrap();
        assert!(s.validate().is_ok());
        assert!(s.escalation_required());
        assert!(s.vehicle_number.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryFeedbackStore::new();
        assert!(!store.submit(&submission()).await.unwrap());
        assert_eq!(store.rows().len(), 1);

        let mut bad = submission();
        bad.location.clear();
        assert!(matches!(
            store.submit(&bad).await.unwrap_err(),
            PersistenceError::InvalidInput(_)
        ));
        assert_eq!(store.rows().len(), 1);
    }
}
