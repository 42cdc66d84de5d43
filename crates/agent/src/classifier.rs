//! Intent Classifier
//!
//! Maps a customer message plus an optional company id to an intent, the
//! system prompt for the completion service, and the spreadsheet tab the
//! conversation is archived to.
//!
//! Matching is deliberately crude: keywords are compared as lowercase
//! substrings (not whole words) and the first rule in declaration order with
//! any matching keyword wins. A short keyword can therefore fire inside an
//! unrelated word ("emi" inside "premium"); that behavior is kept as is.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use helpdesk_agent::Classifier;
//! use helpdesk_config::builtin_registry;
//! use helpdesk_core::IntentTag;
//!
//! let classifier = Classifier::new(Arc::new(builtin_registry().unwrap()));
//! assert_eq!(classifier.detect_intent("My brake is making noise", "honda"), IntentTag::Service);
//! assert_eq!(classifier.routing_key(IntentTag::Service, "honda"), "Service_Conversations");
//! ```

use std::sync::Arc;

use helpdesk_config::{CompanyProfile, CompanyRegistry};
use helpdesk_core::{IntentTag, Result};
use serde::Serialize;
use serde_json::Value;

use crate::request::ChatRequest;

/// Result of classifying one inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedMessage {
    pub company_id: String,
    pub company_name: String,
    pub intent: IntentTag,
    pub prompt_template: String,
    pub routing_key: String,
}

/// Stateless keyword classifier over an immutable company registry
#[derive(Debug, Clone)]
pub struct Classifier {
    registry: Arc<CompanyRegistry>,
}

impl Classifier {
    pub fn new(registry: Arc<CompanyRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CompanyRegistry {
        &self.registry
    }

    /// Pick the company profile for a message
    ///
    /// An exactly matching id wins; otherwise the message is scanned for a
    /// company name, and failing that the default company is used.
    pub fn resolve_company(&self, company_id: Option<&str>, message: &str) -> &CompanyProfile {
        if let Some(profile) = company_id.and_then(|id| self.registry.get(id)) {
            return profile;
        }
        self.registry.get_or_default(self.detect_company(message))
    }

    /// Detect intent; unknown company ids use the default company's rules
    pub fn detect_intent(&self, message: &str, company_id: &str) -> IntentTag {
        let profile = self.registry.get_or_default(company_id);
        Self::match_rules(profile, &message.to_lowercase())
    }

    /// Prompt template for an intent
    ///
    /// Unknown company: the default company's `general` template. Known
    /// company without that intent: its own `general` template.
    pub fn prompt_template(&self, intent: IntentTag, company_id: &str) -> &str {
        match self.registry.get(company_id) {
            Some(profile) => &profile.rule_or_general(intent).prompt_template,
            None => &self.registry.default_profile().general().prompt_template,
        }
    }

    /// Routing key (destination tab) for an intent, same fallbacks as [`Self::prompt_template`]
    pub fn routing_key(&self, intent: IntentTag, company_id: &str) -> &str {
        match self.registry.get(company_id) {
            Some(profile) => &profile.rule_or_general(intent).routing_key,
            None => &self.registry.default_profile().general().routing_key,
        }
    }

    /// First registered company whose display name occurs in the message
    pub fn detect_company(&self, message: &str) -> &str {
        let lowercase_message = message.to_lowercase();
        self.registry
            .iter()
            .find(|profile| profile.is_mentioned_in(&lowercase_message))
            .unwrap_or_else(|| self.registry.default_profile())
            .id
            .as_str()
    }

    /// Resolve company and intent in one pass
    pub fn classify(&self, message: &str, company_id: Option<&str>) -> ClassifiedMessage {
        let profile = self.resolve_company(company_id, message);
        let intent = Self::match_rules(profile, &message.to_lowercase());
        let rule = profile.rule_or_general(intent);

        tracing::debug!(
            company = %profile.id,
            intent = %intent,
            routing_key = %rule.routing_key,
            "Classified message"
        );

        ClassifiedMessage {
            company_id: profile.id.clone(),
            company_name: profile.display_name.clone(),
            intent,
            prompt_template: rule.prompt_template.clone(),
            routing_key: rule.routing_key.clone(),
        }
    }

    /// Classify a raw JSON body of the form `{message, companyId?}`
    ///
    /// Wrong value types are rejected with `InvalidArgument`; a missing or
    /// null message classifies as the empty string.
    pub fn classify_json(&self, body: &Value) -> Result<ClassifiedMessage> {
        let request = ChatRequest::from_value(body)?;
        Ok(self.classify(&request.message, request.company_id.as_deref()))
    }

    fn match_rules(profile: &CompanyProfile, lowercase_message: &str) -> IntentTag {
        profile
            .keyword_rules()
            .find(|rule| rule.matches(lowercase_message))
            .map(|rule| rule.intent)
            .unwrap_or(IntentTag::General)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_config::{builtin_registry, IntentRule};

    fn classifier() -> Classifier {
        Classifier::new(Arc::new(builtin_registry().unwrap()))
    }

    #[test]
    fn test_honda_scenarios() {
        let c = classifier();
        assert_eq!(c.detect_intent("What's the price for a new Civic?", "honda"), IntentTag::Sales);
        assert_eq!(c.detect_intent("My brake is making noise", "honda"), IntentTag::Service);
        assert_eq!(c.detect_intent("I want to file an insurance claim", "honda"), IntentTag::Insurance);
        assert_eq!(c.detect_intent("Hello, what are your hours?", "honda"), IntentTag::General);
    }

    #[test]
    fn test_empty_message_is_general() {
        let c = classifier();
        assert_eq!(c.detect_intent("", "honda"), IntentTag::General);
        assert_eq!(c.detect_intent("", "toyota"), IntentTag::General);
        assert_eq!(c.detect_intent("", "nobody"), IntentTag::General);
    }

    #[test]
    fn test_case_insensitive() {
        let c = classifier();
        assert_eq!(c.detect_intent("TEST DRIVE", "honda"), IntentTag::Sales);
        assert_eq!(c.detect_intent("Oil Change please", "toyota"), IntentTag::Service);
    }

    #[test]
    fn test_declaration_order_wins() {
        let c = classifier();
        // "price" (sales) and "repair" (service) both present
        assert_eq!(c.detect_intent("repair price", "honda"), IntentTag::Sales);
        // "refund" (complaint) and "feedback" (feedback)
        assert_eq!(c.detect_intent("feedback: I want a refund", "honda"), IntentTag::Complaint);
    }

    #[test]
    fn test_substring_shadowing_is_preserved() {
        let c = classifier();
        // "emi" (sales) occurs inside "premium" (insurance)
        assert_eq!(c.detect_intent("premium", "honda"), IntentTag::Sales);
        // "service" (service) occurs inside "service package" (amc)
        assert_eq!(c.detect_intent("service package", "honda"), IntentTag::Service);
        assert_eq!(c.detect_intent("amc", "honda"), IntentTag::Amc);
        // Toyota has no "emi" keyword
        assert_eq!(c.detect_intent("premium", "toyota"), IntentTag::Insurance);
    }

    #[test]
    fn test_unknown_company_uses_default_rules() {
        let c = classifier();
        assert_eq!(c.detect_intent("down payment", "ford"), IntentTag::Sales);
        assert_eq!(c.detect_intent("down payment", "toyota"), IntentTag::General);
    }

    #[test]
    fn test_prompt_and_routing_fallbacks() {
        let c = classifier();
        assert_eq!(c.routing_key(IntentTag::Service, "honda"), "Service_Conversations");
        assert_eq!(c.routing_key(IntentTag::Service, "toyota"), "Toyota_Service");
        assert_eq!(c.routing_key(IntentTag::Service, "ford"), "General_Conversations");
        assert!(c
            .prompt_template(IntentTag::Sales, "ford")
            .starts_with("You are a Honda customer service representative"));
        assert!(c
            .prompt_template(IntentTag::Sales, "toyota")
            .starts_with("You are a Toyota sales representative"));
    }

    #[test]
    fn test_missing_intent_falls_back_to_company_general() {
        let acme = CompanyProfile::new(
            "acme",
            "Acme",
            vec![
                IntentRule::new(IntentTag::Sales, &["buy"], "Sell.", "Acme_Sales"),
                IntentRule::new(IntentTag::General, &[], "Help.", "Acme_General"),
            ],
        )
        .unwrap();
        let registry = CompanyRegistry::new(vec![acme], "acme").unwrap();
        let c = Classifier::new(Arc::new(registry));
        assert_eq!(c.routing_key(IntentTag::Complaint, "acme"), "Acme_General");
        assert_eq!(c.prompt_template(IntentTag::Complaint, "acme"), "Help.");
    }

    #[test]
    fn test_detect_company() {
        let c = classifier();
        assert_eq!(c.detect_company("I love my Toyota Camry"), "toyota");
        assert_eq!(c.detect_company("my HONDA city"), "honda");
        assert_eq!(c.detect_company("my tesla"), "honda");
        // registration order decides when both are named
        assert_eq!(c.detect_company("toyota or honda?"), "honda");
    }

    #[test]
    fn test_resolve_company() {
        let c = classifier();
        assert_eq!(c.resolve_company(Some("toyota"), "honda civic").id, "toyota");
        assert_eq!(c.resolve_company(Some("Toyota"), "hello").id, "honda");
        assert_eq!(c.resolve_company(Some("ford"), "my toyota").id, "toyota");
        assert_eq!(c.resolve_company(None, "my toyota").id, "toyota");
        assert_eq!(c.resolve_company(None, "").id, "honda");
    }

    #[test]
    fn test_classify() {
        let c = classifier();
        let result = c.classify("My Toyota needs an oil change", None);
        assert_eq!(result.company_id, "toyota");
        assert_eq!(result.company_name, "Toyota");
        assert_eq!(result.intent, IntentTag::Service);
        assert_eq!(result.routing_key, "Toyota_Service");
        assert!(result.prompt_template.contains("Toyota service advisor"));
    }

    #[test]
    fn test_classify_json() {
        let c = classifier();
        let result = c
            .classify_json(&serde_json::json!({"message": "Renew my policy", "companyId": "toyota"}))
            .unwrap();
        assert_eq!(result.intent, IntentTag::Insurance);
        assert_eq!(result.routing_key, "Toyota_Insurance");

        let result = c.classify_json(&serde_json::json!({})).unwrap();
        assert_eq!(result.intent, IntentTag::General);
        assert_eq!(result.company_id, "honda");

        let err = c.classify_json(&serde_json::json!({"message": ["hi"]})).unwrap_err();
        assert!(err.is_caller_error());
        assert!(c
            .classify_json(&serde_json::json!({"message": "hi", "companyId": 1}))
            .is_err());
    }
}
