//! Google Sheets v4 REST client
//!
//! Only the handful of calls the assistant needs: spreadsheet metadata, add a
//! tab, and read/write/append cell values.

use std::sync::Arc;
use std::time::Duration;

use helpdesk_config::SheetsConfig;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::TokenProvider;
use crate::credentials::ServiceAccountKey;
use crate::PersistenceError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Spreadsheet title plus its tabs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetInfo {
    pub title: String,
    pub sheets: Vec<SheetSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub title: String,
    pub sheet_id: i64,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    title: String,
    #[serde(default)]
    sheet_id: i64,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// A1 range over whole columns of one tab, quoting the title when needed
pub fn a1_range(sheet: &str, columns: &str) -> String {
    if !sheet.is_empty() && sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{}!{}", sheet, columns)
    } else {
        format!("'{}'!{}", sheet.replace('\'', "''"), columns)
    }
}

pub fn spreadsheet_url(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{}", spreadsheet_id)
}

/// Authenticated client bound to one spreadsheet
#[derive(Clone)]
pub struct SheetsClient {
    http: Client,
    tokens: Arc<TokenProvider>,
    api_base: String,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub fn new(
        http: Client,
        tokens: Arc<TokenProvider>,
        api_base: impl Into<String>,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            api_base: api_base.into(),
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    pub fn from_config(config: &SheetsConfig) -> Result<Self, PersistenceError> {
        if config.spreadsheet_id.is_empty() {
            return Err(PersistenceError::Configuration(
                "sheets.spreadsheet_id is not set".to_string(),
            ));
        }
        let key = ServiceAccountKey::from_config(config)?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                PersistenceError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;
        let tokens = Arc::new(TokenProvider::new(http.clone(), &key, &config.token_uri)?);

        tracing::info!(
            spreadsheet_id = %config.spreadsheet_id,
            client_email = %tokens.client_email(),
            "Google Sheets client configured"
        );

        Ok(Self::new(http, tokens, &config.api_base, &config.spreadsheet_id))
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    pub async fn spreadsheet_info(&self) -> Result<SpreadsheetInfo, PersistenceError> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "properties.title,sheets.properties(title,sheetId)");

        let response: SpreadsheetResponse = self
            .send(self.http.request(Method::GET, url))
            .await?
            .json()
            .await
            .map_err(|e| PersistenceError::InvalidResponse(e.to_string()))?;

        Ok(SpreadsheetInfo {
            title: response.properties.title,
            sheets: response
                .sheets
                .into_iter()
                .map(|s| SheetSummary {
                    title: s.properties.title,
                    sheet_id: s.properties.sheet_id,
                })
                .collect(),
        })
    }

    pub async fn sheet_titles(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .spreadsheet_info()
            .await?
            .sheets
            .into_iter()
            .map(|s| s.title)
            .collect())
    }

    pub async fn add_sheet(&self, title: &str) -> Result<(), PersistenceError> {
        let url = self.url(&[format!("{}:batchUpdate", self.spreadsheet_id).as_str()])?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        self.send(self.http.post(url).json(&body)).await?;
        tracing::info!(sheet = %title, "Created sheet");
        Ok(())
    }

    /// Overwrite the cells of `range`
    pub async fn update_values(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), PersistenceError> {
        let mut url = self.url(&[self.spreadsheet_id.as_str(), "values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        self.send(self.http.put(url).json(&json!({ "values": rows })))
            .await?;
        Ok(())
    }

    /// Append rows after the last non-empty row of `range`
    pub async fn append_values(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), PersistenceError> {
        let append = format!("{}:append", range);
        let mut url = self.url(&[self.spreadsheet_id.as_str(), "values", append.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        self.send(self.http.post(url).json(&json!({ "values": rows })))
            .await?;
        Ok(())
    }

    /// Cell values as strings; missing trailing cells are simply absent
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, PersistenceError> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range])?;
        let response: ValueRange = self
            .send(self.http.get(url))
            .await?
            .json()
            .await
            .map_err(|e| PersistenceError::InvalidResponse(e.to_string()))?;

        Ok(response
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    fn url(&self, segments: &[&str]) -> Result<Url, PersistenceError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| PersistenceError::Configuration(format!("invalid api_base: {}", e)))?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                PersistenceError::Configuration("api_base cannot be a base URL".to_string())
            })?;
            path.pop_if_empty().push("spreadsheets");
            if segments.is_empty() {
                path.push(&self.spreadsheet_id);
            } else {
                path.extend(segments);
            }
        }
        Ok(url)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, PersistenceError> {
        let token = self.tokens.access_token().await?;
        let response = builder.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.tokens.invalidate();
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        Err(PersistenceError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
