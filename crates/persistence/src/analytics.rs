//! Conversation analytics
//!
//! Reads every conversation tab, filters by time range and company, and
//! aggregates counts per intent, company and day.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::conversations::{ConversationLog, ConversationRecord};
use crate::PersistenceError;

/// Tabs that never hold conversations
const NON_CONVERSATION_SHEETS: [&str; 4] = ["Form Responses 1", "Sheet1", "Sheet2", "Sheet3"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "7days")]
    Last7Days,
    #[serde(rename = "30days")]
    Last30Days,
    #[serde(rename = "90days")]
    Last90Days,
}

impl TimeRange {
    /// Oldest timestamp still inside the range
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = match self {
            TimeRange::All => return None,
            TimeRange::Last7Days => 7,
            TimeRange::Last30Days => 30,
            TimeRange::Last90Days => 90,
        };
        Some(now - Duration::days(days))
    }
}

impl FromStr for TimeRange {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(TimeRange::All),
            "7days" => Ok(TimeRange::Last7Days),
            "30days" => Ok(TimeRange::Last30Days),
            "90days" => Ok(TimeRange::Last90Days),
            other => Err(PersistenceError::InvalidInput(format!(
                "unknown timeRange '{}', expected all, 7days, 30days or 90days",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsQuery {
    pub time_range: TimeRange,
    /// `None` means all companies; compared case-insensitively
    pub company: Option<String>,
}

impl AnalyticsQuery {
    pub fn new(time_range: TimeRange, company: Option<&str>) -> Self {
        Self {
            time_range,
            company: company
                .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
                .map(str::to_string),
        }
    }
}

/// Archived record plus the tab it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedConversation {
    #[serde(flatten)]
    pub record: ConversationRecord,
    pub sheet_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_conversations: usize,
    pub intent_breakdown: BTreeMap<String, usize>,
    pub company_breakdown: BTreeMap<String, usize>,
    /// Keyed by `YYYY-MM-DD` (UTC)
    pub daily_activity: BTreeMap<String, usize>,
    /// Mean reply length in characters
    pub average_response_length: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsReport {
    pub conversations: Vec<ArchivedConversation>,
    pub analytics: AnalyticsSummary,
}

/// Whether a tab holds conversation rows
pub fn is_conversation_sheet(name: &str, feedback_sheet: &str) -> bool {
    name != feedback_sheet && !NON_CONVERSATION_SHEETS.contains(&name)
}

/// Lenient timestamp parsing for cells that may have been edited by hand
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Filter, sort newest first, and aggregate
pub fn build_report(
    conversations: Vec<ArchivedConversation>,
    query: &AnalyticsQuery,
    now: DateTime<Utc>,
) -> AnalyticsReport {
    let cutoff = query.time_range.cutoff(now);

    let mut filtered: Vec<(Option<DateTime<Utc>>, ArchivedConversation)> = conversations
        .into_iter()
        .map(|c| (parse_timestamp(&c.record.timestamp), c))
        .filter(|(ts, _)| match cutoff {
            Some(cutoff) => ts.map_or(false, |ts| ts >= cutoff),
            None => true,
        })
        .filter(|(_, c)| {
            query
                .company
                .as_deref()
                .map_or(true, |company| c.record.company.eq_ignore_ascii_case(company))
        })
        .collect();

    // Unparseable timestamps sort last
    filtered.sort_by(|a, b| b.0.cmp(&a.0));

    let mut summary = AnalyticsSummary {
        total_conversations: filtered.len(),
        ..Default::default()
    };
    let mut total_response_length = 0usize;

    for (ts, conversation) in &filtered {
        let record = &conversation.record;
        *summary.intent_breakdown.entry(record.intent.clone()).or_default() += 1;
        *summary.company_breakdown.entry(record.company.clone()).or_default() += 1;
        if let Some(ts) = ts {
            *summary
                .daily_activity
                .entry(ts.format("%Y-%m-%d").to_string())
                .or_default() += 1;
        }
        // UTF-16 code units, the unit the dashboard measures text in
        total_response_length += record.ai_response.encode_utf16().count();
    }

    if !filtered.is_empty() {
        summary.average_response_length = total_response_length as f64 / filtered.len() as f64;
    }

    AnalyticsReport {
        conversations: filtered.into_iter().map(|(_, c)| c).collect(),
        analytics: summary,
    }
}

/// Gather every conversation tab from the archive and build a report
///
/// Tabs are read concurrently; a tab that fails to read is logged and skipped.
pub async fn collect_report(
    log: &dyn ConversationLog,
    feedback_sheet: &str,
    query: &AnalyticsQuery,
) -> Result<AnalyticsReport, PersistenceError> {
    let sheets: Vec<String> = log
        .sheet_names()
        .await?
        .into_iter()
        .filter(|sheet| is_conversation_sheet(sheet, feedback_sheet))
        .collect();

    let reads = join_all(sheets.iter().map(|sheet| log.read_all(sheet))).await;

    let mut conversations = Vec::new();
    for (sheet, result) in sheets.iter().zip(reads) {
        match result {
            Ok(records) => conversations.extend(records.into_iter().map(|record| {
                ArchivedConversation {
                    record,
                    sheet_name: sheet.clone(),
                }
            })),
            Err(e) => {
                tracing::warn!(sheet = %sheet, error = %e, "Skipping unreadable sheet");
            }
        }
    }

    Ok(build_report(conversations, query, Utc::now()))
}
