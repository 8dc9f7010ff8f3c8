// PaperDesk Server - HTTP entry point

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use paperdesk::logging::{self, LogFormat};
use paperdesk::services::tools::build_registry;
use paperdesk::state::AppState;
use paperdesk::storage::{ConfigService, Database, ProjectStore};
use paperdesk_llm::{LlmProvider, OpenAIProviderFactory, ProviderFactory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config_service = ConfigService::new().context("loading configuration")?;
    let config = config_service.get_config().clone();
    logging::init(LogFormat::parse(&config.log_format));
    info!("Configuration loaded from {}", config_service.config_path().display());

    let database_path = config_service.database_path()?;
    let database = Database::new(&database_path)
        .with_context(|| format!("opening database {}", database_path.display()))?;
    info!("Database ready at {}", database_path.display());

    let tools = build_registry(&config, &ProjectStore::new(database.clone())).await;
    let factory = Arc::new(OpenAIProviderFactory::new(config.provider_endpoints())?);

    spawn_startup_ping(Arc::clone(&factory), config.provider.ping_model_slug.clone());

    let state = AppState::new(&config, database, tools, factory)?;
    let app = paperdesk::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!("PaperDesk server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

/// Gateway sanity check; the outcome is only logged.
fn spawn_startup_ping(factory: Arc<OpenAIProviderFactory>, model: String) {
    tokio::spawn(async move {
        let provider = match factory.create(None) {
            Ok(provider) => provider,
            Err(e) => {
                warn!("[Provider] startup ping skipped: {}", e);
                return;
            }
        };
        match provider.ping(&model).await {
            Ok(reply) => info!("[Provider] startup ping via {} ({}): {}", provider.name(), model, reply.trim()),
            Err(e) => warn!("[Provider] startup ping via {} ({}) failed: {}", provider.name(), model, e),
        }
    });
}
