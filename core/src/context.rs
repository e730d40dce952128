use std::sync::Arc;

use crate::chat::ChatClient;
use crate::config::AppConfig;
use crate::error::CliError;
use crate::matching::LlmProvider;
use crate::task::TaskStore;

/// External collaborators, built once at startup.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn TaskStore>,
    pub chat: Arc<dyn ChatClient>,
    pub llm: Option<Arc<dyn LlmProvider>>,
}

impl Services {
    pub fn llm(&self) -> Option<&dyn LlmProvider> {
        self.llm.as_deref()
    }
}

#[async_trait::async_trait]
pub trait ServicesFactory: Send + Sync {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, CliError>;
}
