//! trivia-slack - Slack connector for the TriviaCore game engine
//!
//! Receives trivia channel and direct messages over Socket Mode, hands
//! them to the engine and posts the engine's answers back to Slack.

mod bridge;
mod common;
mod config;
mod game;
mod slack;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use bridge::{ChannelBundle, Dispatcher, MessageFilter, SlackResponder};
use common::error::{AppError, EngineResult};
use config::{env::get_config_path, load_and_validate, Config};
use game::engine::EngineRequest;
use game::ProcessEngine;
use slack::{BotIdentity, DisplayNameResolver, SlackWebClient, SocketModeClient};

/// Everything started before Socket Mode connects.
struct Connector {
    web: Arc<SlackWebClient>,
    dispatcher: Dispatcher,
    engine_task: JoinHandle<EngineResult<()>>,
}

/// Look up the workspace, start the engine and wire up dispatch.
async fn start(config: &Config) -> Result<Connector, AppError> {
    let identity = BotIdentity {
        username: config.bot.display_name.clone(),
        icon_emoji: config.bot.icon_emoji.clone(),
    };
    let web = Arc::new(SlackWebClient::new(
        config.slack.bot_token.clone(),
        config.slack.app_token.clone(),
        identity,
    ));

    let team_id = web.team_id().await?;
    info!("Connected to workspace {}", team_id);

    let names = Arc::new(DisplayNameResolver::new(
        web.clone(),
        config.display_names.ttl(),
    ));
    let responder = Arc::new(SlackResponder::new(
        web.clone(),
        names.clone(),
        config.trivia.channel.clone(),
    ));

    let init = EngineRequest::Init {
        platform: team_id,
        settings: config.trivia.clone(),
    };
    let (engine, engine_task) = ProcessEngine::spawn(&config.engine, init, responder)?;

    let dispatcher = Dispatcher::new(
        MessageFilter::new(config.trivia.channel.clone()),
        Arc::new(engine),
        web.clone(),
        names,
    );

    Ok(Connector {
        web,
        dispatcher,
        engine_task,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("trivia-slack v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted, or set the environment overrides.", config_path);
        AppError::from(e)
    })?;

    info!("Configuration loaded successfully");
    info!("  Trivia channel: {}", config.trivia.channel);
    info!("  Database: {}", config.trivia.database_path);
    info!("  Engine: {}", config.engine.command);
    info!(
        "  Display name cache: {}s",
        config.display_names.cache_expire_seconds
    );

    let Connector {
        web,
        dispatcher,
        engine_task,
    } = start(&config).await.map_err(|e| {
        error!("Failed to start connector: {}", e);
        e
    })?;

    let channels = ChannelBundle::new();
    let shutdown_tx = channels.control.shutdown_tx;

    let mut socket_task = {
        let socket = SocketModeClient::new(web);
        let envelope_tx = channels.socket.envelope_tx;
        let shutdown_rx = channels.socket.shutdown_rx;
        tokio::spawn(async move { socket.run(envelope_tx, shutdown_rx).await })
    };

    let dispatch_task = {
        let envelope_rx = channels.dispatch.envelope_rx;
        tokio::spawn(async move { dispatcher.run(envelope_rx).await })
    };

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - closing Socket Mode connection...");
            true
        }
        _ = &mut socket_task => false,
        result = engine_task => {
            match result {
                Ok(Ok(())) => error!("Trivia engine closed its output"),
                Ok(Err(e)) => error!("Trivia engine failed: {}", e),
                Err(e) => error!("Trivia engine task panicked: {}", e),
            }
            true
        }
        _ = dispatch_task => false,
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (socket client already exited): {}", e);
        }
        let timeout = Duration::from_secs(5);
        match tokio::time::timeout(timeout, socket_task).await {
            Ok(Ok(())) => info!("Socket Mode client stopped gracefully"),
            Ok(Err(e)) => warn!("Socket Mode task panicked: {}", e),
            Err(_) => warn!("Socket Mode shutdown timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
