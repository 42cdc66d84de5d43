//! Chat history types
//!
//! `ChatTurn` is the shape the browser sends (`{message, isUser}`);
//! `HistoryMessage` is the role/content shape forwarded to the completion
//! service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One prior turn as sent by the chat client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub message: String,
    #[serde(default)]
    pub is_user: bool,
}

impl ChatTurn {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_user: true,
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_user: false,
        }
    }

    pub fn role(&self) -> Role {
        if self.is_user {
            Role::User
        } else {
            Role::Assistant
        }
    }
}

/// History entry in completion-service format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

impl From<&ChatTurn> for HistoryMessage {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role(),
            content: turn.message.clone(),
        }
    }
}
