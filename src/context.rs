//! Shared registries handed to every client

use crate::auth::{CredentialStore, LoadSummary, SessionCache};
use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::models::ModelRegistry;
use std::fmt;
use std::sync::Arc;

/// Configuration, service keys, sessions and models shared by all clients.
///
/// Cloning is cheap; clones share the same registries. Build one per process
/// (or per test) and create clients from it.
#[derive(Clone)]
pub struct ApiContext {
    config: Arc<ClientConfig>,
    credentials: Arc<CredentialStore>,
    sessions: Arc<SessionCache>,
    models: Arc<ModelRegistry>,
}

impl ApiContext {
    /// Load service keys from the configured directories and register the built-in models
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        Self::with_registry(config, ModelRegistry::with_defaults()?)
    }

    /// Context configured from the environment
    pub fn from_env() -> ApiResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Context using a custom model registry
    pub fn with_registry(config: ClientConfig, models: ModelRegistry) -> ApiResult<Self> {
        config.validate()?;

        let credentials = Arc::new(CredentialStore::load_configured(config.key_dirs.clone())?);
        let sessions = Arc::new(SessionCache::new(credentials.clone(), &config)?);

        tracing::info!(
            target: "context",
            keys = credentials.len(),
            models = models.portal_types().len(),
            "GEVER client context ready"
        );

        Ok(Self {
            config: Arc::new(config),
            credentials,
            sessions,
            models: Arc::new(models),
        })
    }

    /// Client for the resource at `url`, acting as `username`
    pub fn client(&self, url: &str, username: &str) -> ApiResult<Client> {
        Client::new(self, url, username)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn sessions(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Drop all sessions and reload the service keys
    pub fn reset(&self) -> ApiResult<LoadSummary> {
        self.sessions.clear_all();
        self.credentials.reset()
    }
}

impl fmt::Debug for ApiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiContext")
            .field("config", &self.config)
            .field("base_urls", &self.credentials.base_urls())
            .field("sessions", &self.sessions.len())
            .field("models", &self.models)
            .finish()
    }
}
