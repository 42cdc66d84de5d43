//! Main settings module

use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// Environment named by `HELPDESK_ENV`; unknown names are development
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Conversation-completion service
    #[serde(default)]
    pub flowise: FlowiseConfig,

    /// Google Sheets storage
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Optional YAML company registry; the built-in profiles are used when unset
    #[serde(default)]
    pub registry_path: Option<String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_flowise()?;
        self.validate_sheets()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port must be non-zero".to_string(),
            });
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Request timeout must be at least 1 second".to_string(),
            });
        }

        let auth = &self.server.auth;
        if auth.enabled && auth.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingField("server.auth.api_key".to_string()));
        }

        Ok(())
    }

    fn validate_flowise(&self) -> Result<(), ConfigError> {
        let flowise = &self.flowise;

        if !flowise.endpoint.starts_with("http://") && !flowise.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "flowise.endpoint".to_string(),
                message: format!("Must be an http(s) URL, got '{}'", flowise.endpoint),
            });
        }

        if flowise.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "flowise.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if flowise.max_retries > 10 {
            return Err(ConfigError::InvalidValue {
                field: "flowise.max_retries".to_string(),
                message: format!("At most 10 retries allowed, got {}", flowise.max_retries),
            });
        }

        // Every attempt plus backoff must finish before the route timeout cuts the request off
        let request_timeout = Duration::from_secs(self.server.timeout_seconds);
        let worst_case = flowise.worst_case_duration();
        if worst_case >= request_timeout {
            return Err(ConfigError::InvalidValue {
                field: "flowise.timeout_seconds".to_string(),
                message: format!(
                    "{} attempt(s) of {}s plus backoff take {:?}, which is not below server.timeout_seconds ({}s)",
                    flowise.max_retries + 1,
                    flowise.timeout_seconds,
                    worst_case,
                    self.server.timeout_seconds
                ),
            });
        }

        Ok(())
    }

    /// Sheets credentials are only mandatory outside development; a dev
    /// server without them still classifies and answers, it just cannot archive.
    fn validate_sheets(&self) -> Result<(), ConfigError> {
        let sheets = &self.sheets;

        if sheets.feedback_sheet.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sheets.feedback_sheet".to_string(),
                message: "Feedback tab name must not be empty".to_string(),
            });
        }

        if self.environment.is_strict() {
            if sheets.spreadsheet_id.is_empty() {
                return Err(ConfigError::MissingField("sheets.spreadsheet_id".to_string()));
            }
            if !sheets.has_credentials() {
                return Err(ConfigError::MissingField(
                    "sheets.credentials_json or sheets.client_email/private_key".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            auth: AuthConfig::default(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Enable authentication (set to false for development)
    #[serde(default)]
    pub enabled: bool,

    /// API key (set via HELPDESK__SERVER__AUTH__API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Paths that bypass authentication
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    /// Path prefixes that need the API key even while `enabled` is false
    #[serde(default = "default_admin_paths")]
    pub admin_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/ready".to_string(),
        "/metrics".to_string(),
    ]
}

fn default_admin_paths() -> Vec<String> {
    vec!["/admin/".to_string(), "/api/diagnostics".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            public_paths: default_public_paths(),
            admin_paths: default_admin_paths(),
        }
    }
}

/// Flowise prediction endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowiseConfig {
    /// Full prediction URL, including the chatflow id
    #[serde(default = "default_flowise_endpoint")]
    pub endpoint: String,

    /// Bearer token, sent only when present
    #[serde(default = "default_flowise_api_key")]
    pub api_key: Option<String>,

    /// Per-attempt timeout
    #[serde(default = "default_flowise_timeout")]
    pub timeout_seconds: u64,

    /// Retries for transient failures (network, timeout, 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff, doubled on each retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_flowise_endpoint() -> String {
    std::env::var("FLOWISE_ENDPOINT").unwrap_or_else(|_| {
        "https://cloud.flowiseai.com/api/v1/prediction/cf29a384-89aa-4940-81d3-1a819e1167d0"
            .to_string()
    })
}

fn default_flowise_api_key() -> Option<String> {
    std::env::var("FLOWISE_API_KEY").ok().filter(|k| !k.is_empty())
}

fn default_flowise_timeout() -> u64 {
    8
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    200
}

impl Default for FlowiseConfig {
    fn default() -> Self {
        Self {
            endpoint: default_flowise_endpoint(),
            api_key: default_flowise_api_key(),
            timeout_seconds: default_flowise_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl FlowiseConfig {
    /// Longest a completion can take: every attempt times out and every backoff is slept
    pub fn worst_case_duration(&self) -> Duration {
        let attempts = self.max_retries + 1;
        let backoff_ms = (0..self.max_retries)
            .map(|i| self.initial_backoff_ms.saturating_mul(1u64 << i.min(32)))
            .fold(0u64, u64::saturating_add);
        Duration::from_secs(self.timeout_seconds.saturating_mul(attempts as u64))
            + Duration::from_millis(backoff_ms)
    }
}

/// Google Sheets configuration
///
/// Credentials come either as the full service-account JSON document
/// (`credentials_json`, legacy `GOOGLE_SHEETS_CREDENTIALS`) or as the separate
/// `client_email` / `private_key` pair (`GOOGLE_CLIENT_EMAIL`, `GOOGLE_PRIVATE_KEY`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default = "default_spreadsheet_id")]
    pub spreadsheet_id: String,

    #[serde(default = "default_credentials_json")]
    pub credentials_json: Option<String>,

    #[serde(default = "default_client_email")]
    pub client_email: Option<String>,

    #[serde(default = "default_private_key")]
    pub private_key: Option<String>,

    /// Tab receiving feedback-form rows
    #[serde(default = "default_feedback_sheet")]
    pub feedback_sheet: String,

    /// Tab used by record-chat when the caller names none
    #[serde(default = "default_conversation_sheet")]
    pub default_conversation_sheet: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_spreadsheet_id() -> String {
    std::env::var("GOOGLE_SHEET_ID").unwrap_or_default()
}

fn default_credentials_json() -> Option<String> {
    std::env::var("GOOGLE_SHEETS_CREDENTIALS").ok().filter(|c| !c.is_empty())
}

fn default_client_email() -> Option<String> {
    std::env::var("GOOGLE_CLIENT_EMAIL").ok().filter(|c| !c.is_empty())
}

fn default_private_key() -> Option<String> {
    std::env::var("GOOGLE_PRIVATE_KEY").ok().filter(|c| !c.is_empty())
}

fn default_feedback_sheet() -> String {
    "Calls".to_string()
}

fn default_conversation_sheet() -> String {
    "Conversations".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_api_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

impl SheetsConfig {
    /// Whether some form of service-account credentials is configured
    pub fn has_credentials(&self) -> bool {
        self.credentials_json.is_some()
            || (self.client_email.is_some() && self.private_key.is_some())
    }

    /// Whether archiving to Google Sheets can be attempted at all
    pub fn is_configured(&self) -> bool {
        !self.spreadsheet_id.is_empty() && self.has_credentials()
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: default_spreadsheet_id(),
            credentials_json: default_credentials_json(),
            client_email: default_client_email(),
            private_key: default_private_key(),
            feedback_sheet: default_feedback_sheet(),
            default_conversation_sheet: default_conversation_sheet(),
            token_uri: default_token_uri(),
            api_base: default_api_base(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority: env vars (`HELPDESK__SECTION__KEY`) > config/{env} > config/default > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Load settings rooted at an explicit config directory
pub fn load_settings_from(config_dir: &str, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name(&format!("{}/default", config_dir)).required(false));

    if let Some(env_name) = env {
        builder = builder
            .add_source(File::with_name(&format!("{}/{}", config_dir, env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("HELPDESK")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
