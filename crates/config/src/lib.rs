//! Configuration management for the customer-service assistant
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`)
//! - Environment variables (HELPDESK_ prefix, `__` separator)
//! - Legacy variables (`GOOGLE_SHEET_ID`, `GOOGLE_SHEETS_CREDENTIALS`,
//!   `GOOGLE_CLIENT_EMAIL`, `GOOGLE_PRIVATE_KEY`, `FLOWISE_API_KEY`) as defaults
//!
//! # Company Registry
//!
//! Per-company intent rules live in [`company`]. The compiled-in Honda and
//! Toyota profiles are in [`builtin`]; a YAML registry can replace them via
//! `registry_path`.

pub mod builtin;
pub mod company;
pub mod settings;

pub use builtin::{builtin_registry, DEFAULT_COMPANY};
pub use company::{CompanyProfile, CompanyRegistry, IntentRule};
pub use settings::{
    load_settings, load_settings_from, AuthConfig, FlowiseConfig, ObservabilityConfig,
    RuntimeEnvironment, ServerConfig, Settings, SheetsConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl ConfigError {
    /// Settings were read but rejected by validation
    pub fn is_validation(&self) -> bool {
        matches!(self, ConfigError::MissingField(_) | ConfigError::InvalidValue { .. })
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Load the company registry named by settings, or the built-in one
pub fn load_registry(settings: &Settings) -> Result<CompanyRegistry, ConfigError> {
    match settings.registry_path.as_deref() {
        Some(path) if !path.is_empty() => {
            let registry = CompanyRegistry::load(path)?;
            tracing::info!(
                path = %path,
                companies = registry.len(),
                default = %registry.default_profile().id,
                "Loaded company registry from file"
            );
            Ok(registry)
        }
        _ => builtin_registry(),
    }
}

/// Whether startup may continue on built-in defaults after `err`
///
/// Only an unreadable config in development falls back. Settings that were
/// read but failed validation, and any failure in staging or production, stop
/// startup; defaults there would silently turn off auth and archiving.
pub fn may_fall_back_to_defaults(env: Option<&str>, err: &ConfigError) -> bool {
    let environment = env.map_or(RuntimeEnvironment::Development, RuntimeEnvironment::from_name);
    !err.is_validation() && !environment.is_strict()
}
