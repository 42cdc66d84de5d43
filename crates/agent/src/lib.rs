//! Message classification for the customer-service assistant
//!
//! Features:
//! - Keyword intent detection per company
//! - Company detection from free text
//! - Prompt template and routing key selection
//! - Validation of inbound chat requests

pub mod classifier;
pub mod request;

pub use classifier::{ClassifiedMessage, Classifier};
pub use request::ChatRequest;
