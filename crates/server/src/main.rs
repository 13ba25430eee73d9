mod bootstrap;
mod routes;

use anyhow::Result;

use joey_core::config::{AppConfig, LoadOptions};
use routes::AppState;

fn init_logging(config: &AppConfig) {
    use joey_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let state = AppState {
        agent: app.agent,
        quests: app.quests,
        chat: app.chat,
        bot: app.config.bot.clone(),
    };
    let router = routes::router(state);

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    tracing::info!(event_name = "system.server.listening", %address, "joey is awake");

    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!(event_name = "system.server.signal_failed", "ctrl-c handler failed");
    }
    tracing::info!(event_name = "system.server.shutdown", "joey is heading off");
}
