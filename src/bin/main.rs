use financial_copilot_agents::{
    agents::create_default_registry,
    dataset::RemoteDatasetFactory,
    llm::ModelRouter,
    models::{AgentState, Message, Role},
    settings::RunConfig,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let input = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if input.trim().is_empty() {
        eprintln!("Usage: chat <message>   e.g. chat \"@warren_buffett analyze AAPL\"");
        eprintln!("📌 Settings are read from FINANCE_SETTINGS (base64 JSON)");
        std::process::exit(2);
    }

    let config = match std::env::var("FINANCE_SETTINGS") {
        Ok(blob) => RunConfig::with_settings_blob(blob),
        Err(_) => RunConfig::new(),
    };
    // Fail fast on a malformed blob
    config.settings()?;

    let registry = create_default_registry(
        Arc::new(ModelRouter::new()),
        Arc::new(RemoteDatasetFactory::new()),
    );
    let agent = registry
        .get("agent")
        .ok_or("general agent is not registered")?;

    let state = AgentState::with_messages(vec![Message::user(input.as_str())]);
    let turn_start = state.messages.len();
    info!(agent = agent.name(), "Running conversation turn");

    match agent.run(state, &config).await {
        Ok(state) => {
            for message in state.messages[turn_start..]
                .iter()
                .filter(|m| m.role == Role::Assistant)
            {
                println!("{}", message.text());
            }
            if let Some(suggestions) = state.suggestions {
                info!(count = suggestions.len(), "Suggestions offered");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Conversation turn failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
