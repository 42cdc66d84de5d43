//! Company Registry
//!
//! Static per-company configuration: which keywords map to which intent, the
//! prompt template each intent hands to the completion service, and the
//! spreadsheet tab ("routing key") conversations of that intent land in.
//!
//! The registry is built once at startup, either from the compiled-in
//! profiles (see [`crate::builtin`]) or from a YAML file, and is immutable
//! afterwards. Every profile is validated on construction so lookups can rely
//! on the `general` rule being present.
//!
//! ```yaml
//! default_company: honda
//! companies:
//!   - id: honda
//!     display_name: Honda
//!     intent_rules:
//!       - intent: sales
//!         keywords: [buy, price]
//!         prompt_template: "You are a Honda sales representative."
//!         routing_key: Sales_Conversations
//!       - intent: general
//!         prompt_template: "You are a Honda customer service representative."
//!         routing_key: General_Conversations
//! ```

use helpdesk_core::IntentTag;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::ConfigError;

/// Keyword rule for one (company, intent) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRule {
    pub intent: IntentTag,
    /// Lowercase substrings; empty for the `general` fallback
    #[serde(default)]
    pub keywords: Vec<String>,
    pub prompt_template: String,
    /// Destination spreadsheet tab
    pub routing_key: String,
}

impl IntentRule {
    pub fn new(
        intent: IntentTag,
        keywords: &[&str],
        prompt_template: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            intent,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            prompt_template: prompt_template.into(),
            routing_key: routing_key.into(),
        }
    }

    /// Whether any keyword occurs in an already-lowercased message
    pub fn matches(&self, lowercase_message: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| lowercase_message.contains(keyword.as_str()))
    }
}

/// Serialized shape of a profile, validated into [`CompanyProfile`]
#[derive(Debug, Clone, Deserialize)]
struct CompanyProfileDef {
    id: String,
    display_name: String,
    intent_rules: Vec<IntentRule>,
}

/// Static configuration bundle for one supported brand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CompanyProfileDef")]
pub struct CompanyProfile {
    pub id: String,
    pub display_name: String,
    /// Rules in declaration order; matching walks them front to back
    intent_rules: Vec<IntentRule>,
    #[serde(skip)]
    display_name_lower: String,
    #[serde(skip)]
    general_index: usize,
}

impl TryFrom<CompanyProfileDef> for CompanyProfile {
    type Error = ConfigError;

    fn try_from(def: CompanyProfileDef) -> Result<Self, Self::Error> {
        CompanyProfile::new(def.id, def.display_name, def.intent_rules)
    }
}

impl CompanyProfile {
    /// Build and validate a profile
    ///
    /// Keywords are lowercased here so matching only lowercases the message.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        intent_rules: Vec<IntentRule>,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        let display_name = display_name.into();

        if id.trim().is_empty() {
            return Err(ConfigError::MissingField("company.id".to_string()));
        }
        if display_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("{}.display_name", id),
                message: "Display name must not be empty".to_string(),
            });
        }

        let mut seen = Vec::with_capacity(intent_rules.len());
        let mut rules = Vec::with_capacity(intent_rules.len());
        for mut rule in intent_rules {
            if seen.contains(&rule.intent) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.intent_rules", id),
                    message: format!("Duplicate rule for intent '{}'", rule.intent),
                });
            }
            if rule.intent.is_fallback() && !rule.keywords.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.intent_rules.general.keywords", id),
                    message: "The general fallback must not declare keywords".to_string(),
                });
            }
            if rule.routing_key.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.intent_rules.{}.routing_key", id, rule.intent),
                    message: "Routing key must not be empty".to_string(),
                });
            }
            rule.keywords = rule
                .keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            seen.push(rule.intent);
            rules.push(rule);
        }

        let general_index = rules
            .iter()
            .position(|r| r.intent.is_fallback())
            .ok_or_else(|| ConfigError::MissingField(format!("{}.intent_rules.general", id)))?;

        Ok(Self {
            display_name_lower: display_name.to_lowercase(),
            id,
            display_name,
            intent_rules: rules,
            general_index,
        })
    }

    /// All rules in declaration order, `general` included
    pub fn rules(&self) -> &[IntentRule] {
        &self.intent_rules
    }

    /// Rule for an intent, if this company registers one
    pub fn rule(&self, intent: IntentTag) -> Option<&IntentRule> {
        self.intent_rules.iter().find(|r| r.intent == intent)
    }

    /// Rule for an intent, falling back to `general`
    pub fn rule_or_general(&self, intent: IntentTag) -> &IntentRule {
        self.rule(intent).unwrap_or_else(|| self.general())
    }

    /// The mandatory fallback rule
    pub fn general(&self) -> &IntentRule {
        &self.intent_rules[self.general_index]
    }

    /// Keyword rules (everything but `general`) in declaration order
    pub fn keyword_rules(&self) -> impl Iterator<Item = &IntentRule> {
        self.intent_rules.iter().filter(|r| !r.intent.is_fallback())
    }

    /// Whether the lowercased display name occurs in an already-lowercased message
    pub fn is_mentioned_in(&self, lowercase_message: &str) -> bool {
        lowercase_message.contains(self.display_name_lower.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    default_company: Option<String>,
    companies: Vec<CompanyProfile>,
}

/// Read-only set of company profiles with a designated default
#[derive(Debug, Clone)]
pub struct CompanyRegistry {
    profiles: Vec<CompanyProfile>,
    index: HashMap<String, usize>,
    default_index: usize,
}

impl CompanyRegistry {
    /// Build a registry; profiles keep their registration order
    pub fn new(profiles: Vec<CompanyProfile>, default_id: &str) -> Result<Self, ConfigError> {
        if profiles.is_empty() {
            return Err(ConfigError::MissingField("companies".to_string()));
        }

        let mut index = HashMap::with_capacity(profiles.len());
        for (i, profile) in profiles.iter().enumerate() {
            if index.insert(profile.id.clone(), i).is_some() {
                return Err(ConfigError::InvalidValue {
                    field: "companies".to_string(),
                    message: format!("Duplicate company id '{}'", profile.id),
                });
            }
        }

        let default_index = *index.get(default_id).ok_or_else(|| ConfigError::InvalidValue {
            field: "default_company".to_string(),
            message: format!("Unknown company '{}'", default_id),
        })?;

        Ok(Self {
            profiles,
            index,
            default_index,
        })
    }

    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::FileNotFound(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse from YAML; the first company is the default unless `default_company` names one
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: RegistryFile =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let default_id = match file.default_company {
            Some(id) => id,
            None => file
                .companies
                .first()
                .map(|c| c.id.clone())
                .ok_or_else(|| ConfigError::MissingField("companies".to_string()))?,
        };

        Self::new(file.companies, &default_id)
    }

    /// Exact, case-sensitive lookup
    pub fn get(&self, id: &str) -> Option<&CompanyProfile> {
        self.index.get(id).map(|&i| &self.profiles[i])
    }

    /// Lookup falling back to the default profile
    pub fn get_or_default(&self, id: &str) -> &CompanyProfile {
        self.get(id).unwrap_or_else(|| self.default_profile())
    }

    pub fn default_profile(&self) -> &CompanyProfile {
        &self.profiles[self.default_index]
    }

    /// Profiles in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CompanyProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Every routing key across all companies, deduplicated, in registration order
    pub fn routing_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for rule in self.profiles.iter().flat_map(|p| p.intent_rules.iter()) {
            if !keys.contains(&rule.routing_key.as_str()) {
                keys.push(rule.routing_key.as_str());
            }
        }
        keys
    }
}
