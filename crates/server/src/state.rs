//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use helpdesk_agent::Classifier;
use helpdesk_config::{load_settings, CompanyRegistry, Settings};
use helpdesk_llm::CompletionBackend;
use helpdesk_persistence::{ConversationLog, FeedbackStore, PersistenceLayer, SheetsClient};
use parking_lot::RwLock;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration wrapped in RwLock for hot-reload support
    pub config: Arc<RwLock<Settings>>,
    /// Intent classifier over the company registry loaded at startup
    pub classifier: Classifier,
    /// Conversation-completion service
    pub completion: Arc<dyn CompletionBackend>,
    /// Conversation archive (Sheets or in-memory)
    pub conversations: Arc<dyn ConversationLog>,
    /// Feedback-form sink
    pub feedback: Arc<dyn FeedbackStore>,
    /// Present when archiving to Google Sheets
    pub sheets: Option<SheetsClient>,
    /// Environment name for config reload
    env: Option<String>,
}

impl AppState {
    pub fn new(
        config: Settings,
        registry: Arc<CompanyRegistry>,
        completion: Arc<dyn CompletionBackend>,
        persistence: PersistenceLayer,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            classifier: Classifier::new(registry),
            completion,
            conversations: persistence.conversations,
            feedback: persistence.feedback,
            sheets: persistence.sheets,
            env: None,
        }
    }

    /// Set the environment name used when reloading configuration
    pub fn with_env(mut self, env: Option<String>) -> Self {
        self.env = env;
        self
    }

    /// Reload configuration from files
    ///
    /// The company registry, completion client and Sheets client are built
    /// once at startup and are not affected.
    pub fn reload_config(&self) -> Result<(), String> {
        let new_config = load_settings(self.env.as_deref())
            .map_err(|e| format!("Failed to reload config: {}", e))?;

        let mut config = self.config.write();
        *config = new_config;

        tracing::info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Get a read guard to the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }

    pub fn registry(&self) -> &CompanyRegistry {
        self.classifier.registry()
    }
}
