use financial_copilot_agents::{
    agents::create_default_registry, api::start_server, dataset::RemoteDatasetFactory,
    llm::ModelRouter,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let api_port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "2024".to_string())
        .parse()?;

    info!("🚀 Financial Copilot Agents - API Server");
    info!("📍 Port: {}", api_port);

    // Model and dataset endpoints come from each request's settings
    let registry = create_default_registry(
        Arc::new(ModelRouter::new()),
        Arc::new(RemoteDatasetFactory::new()),
    );

    for agent in registry.list() {
        info!(agent = %agent.name, "✅ Agent registered");
    }
    info!("📡 Starting API server...");

    start_server(registry, api_port).await?;

    Ok(())
}
