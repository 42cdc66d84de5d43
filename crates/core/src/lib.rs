//! Core types for the customer-service assistant
//!
//! This crate provides the small set of value types every other crate shares:
//! - Intent tags used for classification and routing
//! - Chat history types exchanged with the browser and the completion service
//! - The top-level error type

pub mod conversation;
pub mod error;
pub mod intent;

pub use conversation::{ChatTurn, HistoryMessage, Role};
pub use error::{Error, Result};
pub use intent::IntentTag;
