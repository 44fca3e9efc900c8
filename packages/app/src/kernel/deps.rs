//! Application dependencies (using traits for testability)
//!
//! `AppDeps` is the single composition root: concrete providers are
//! constructed once at process start and handed to each holder at creation.
//! Holders never reach for process-wide singletons.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use gigachat::{GigachatClient, GigachatOptions};

use crate::config::Config;
use crate::kernel::{BaseAuthService, BaseChatService, BaseDocumentStore};

// =============================================================================
// GigachatClient Adapter (implements BaseChatService trait)
// =============================================================================

/// Wrapper around GigachatClient that implements the BaseChatService trait
pub struct GigachatAdapter(pub Arc<GigachatClient>);

impl GigachatAdapter {
    pub fn new(client: Arc<GigachatClient>) -> Self {
        Self(client)
    }

    pub fn from_config(config: &Config) -> Self {
        let options = GigachatOptions::new(
            config.gigachat_authorization_key.clone(),
            config.gigachat_client_id.clone(),
        );
        Self(Arc::new(GigachatClient::new(options)))
    }
}

#[async_trait]
impl BaseChatService for GigachatAdapter {
    async fn send(&self, prompt: &str) -> Result<String> {
        self.0
            .send_message(prompt)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

// =============================================================================
// AppDeps
// =============================================================================

/// Application dependencies accessible to holders (using traits for testability)
#[derive(Clone)]
pub struct AppDeps {
    pub auth: Arc<dyn BaseAuthService>,
    pub store: Arc<dyn BaseDocumentStore>,
    pub chat: Arc<dyn BaseChatService>,
    /// Prepended to phone numbers entered without a `+` prefix.
    pub default_country_code: String,
}

impl AppDeps {
    pub fn new(
        auth: Arc<dyn BaseAuthService>,
        store: Arc<dyn BaseDocumentStore>,
        chat: Arc<dyn BaseChatService>,
        default_country_code: String,
    ) -> Self {
        Self {
            auth,
            store,
            chat,
            default_country_code,
        }
    }
}
