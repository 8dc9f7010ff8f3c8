//! Application State
//!
//! Shared state behind every HTTP handler.

use std::sync::Arc;

use paperdesk_llm::ProviderFactory;
use paperdesk_tools::ToolRegistry;

use crate::models::ServerConfig;
use crate::services::{OrchestratorConfig, OrchestratorService, PromptAssembler, Stores};
use crate::storage::{ConversationStore, Database, ProjectStore, UsageStore, UserStore};
use crate::utils::error::AppResult;

/// Application state shared by the router
#[derive(Clone)]
pub struct AppState {
    database: Database,
    stores: Stores,
    orchestrator: Arc<OrchestratorService>,
}

impl AppState {
    /// Wire stores, prompts and the orchestrator around one database.
    pub fn new(
        config: &ServerConfig,
        database: Database,
        tools: ToolRegistry,
        providers: Arc<dyn ProviderFactory>,
    ) -> AppResult<Self> {
        let stores = Self::stores_for(&database);
        let orchestrator = OrchestratorService::new(
            stores.clone(),
            PromptAssembler::new()?,
            Arc::new(tools),
            providers,
            OrchestratorConfig::from(config),
        );
        Ok(Self {
            database,
            stores,
            orchestrator: Arc::new(orchestrator),
        })
    }

    pub fn stores_for(database: &Database) -> Stores {
        Stores {
            conversations: ConversationStore::new(database.clone()),
            projects: ProjectStore::new(database.clone()),
            users: UserStore::new(database.clone()),
            usage: UsageStore::new(database.clone()),
        }
    }

    pub fn orchestrator(&self) -> Arc<OrchestratorService> {
        Arc::clone(&self.orchestrator)
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.stores.conversations
    }

    pub fn projects(&self) -> &ProjectStore {
        &self.stores.projects
    }

    pub fn users(&self) -> &UserStore {
        &self.stores.users
    }

    pub fn is_database_healthy(&self) -> bool {
        self.database.is_healthy()
    }
}
