use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use concierge_chat::config::Config;
use concierge_chat::state::AppState;
use concierge_chat::web;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "concierge_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting concierge-chat");

    // Load configuration
    let config = Config::from_env()?;

    // Create application state
    let state = AppState::new(config)?;

    // Start web server
    web::start_server(state).await?;

    Ok(())
}
