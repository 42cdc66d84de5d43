//! Inbound chat request validation
//!
//! The chat endpoint accepts loosely typed JSON from the browser. Values of
//! the wrong type are rejected here with `InvalidArgument` instead of being
//! coerced or silently defaulted.

use helpdesk_core::{ChatTurn, Error, Result};
use serde_json::Value;

/// Validated chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub chat_history: Vec<ChatTurn>,
    pub company_id: Option<String>,
}

impl ChatRequest {
    /// Validate a raw JSON body
    ///
    /// `message` must be a string; `companyId` may be absent or null but
    /// otherwise must be a string; `chatHistory` may be absent or null but
    /// otherwise must be an array of `{message, isUser}` objects.
    pub fn from_value(body: &Value) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::invalid_argument("request body must be a JSON object"))?;

        let message = match object.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                return Err(Error::invalid_argument(format!(
                    "message must be a string, got {}",
                    json_type(other)
                )))
            }
        };

        let company_id = match object.get("companyId") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(Error::invalid_argument(format!(
                    "companyId must be a string, got {}",
                    json_type(other)
                )))
            }
        };

        let chat_history = match object.get("chatHistory") {
            Some(Value::Null) | None => Vec::new(),
            Some(value @ Value::Array(_)) => serde_json::from_value(value.clone())
                .map_err(|e| Error::invalid_argument(format!("chatHistory is malformed: {}", e)))?,
            Some(other) => {
                return Err(Error::invalid_argument(format!(
                    "chatHistory must be an array, got {}",
                    json_type(other)
                )))
            }
        };

        Ok(Self {
            message,
            chat_history,
            company_id,
        })
    }

    /// Whether there is anything to classify and answer
    pub fn has_message(&self) -> bool {
        !self.message.trim().is_empty()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
