mod api;
mod broker;
mod config;
mod feed;
mod ws;

use std::sync::Arc;
use std::time::Duration;
use log::{error, info};
use tokio::net::TcpListener;
use tokio::time::interval;
use tower_http::cors::CorsLayer;

use crate::api::{create_api_router, ApiState};
use crate::broker::RateBroker;
use crate::config::{Config, RATES_URL, STATS_INTERVAL_SECS};
use crate::feed::{RateFetcher, RatePoller};
use crate::ws::WsSessionHandler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    // Log configuration
    config.log_config();

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e.into());
    }

    // The broker is the single authoritative snapshot + subscriber registry,
    // constructed here and injected into everything that needs it.
    let broker = Arc::new(RateBroker::new());

    // Start background tasks
    start_background_tasks(broker.clone(), config.poll_interval_secs).await;

    // Start API server
    let api_state = ApiState {
        broker: broker.clone(),
    };
    let api_router = create_api_router(api_state).layer(CorsLayer::permissive());

    let api_bind_address = config.api_bind_address.clone();
    let api_listener = TcpListener::bind(&api_bind_address).await?;
    info!("HTTP API server running at http://{}", api_bind_address);

    let api_server = async move { axum::serve(api_listener, api_router).await };

    // Start WebSocket server
    let ws_bind_address = config.bind_address.clone();
    let ws_listener = TcpListener::bind(&ws_bind_address).await?;
    info!("WebSocket server running at ws://{}/ws", ws_bind_address);

    let websocket_server = async move {
        while let Ok((stream, addr)) = ws_listener.accept().await {
            let handler = WsSessionHandler::new(broker.clone(), addr.to_string());
            tokio::spawn(async move {
                handler.handle_connection(stream).await;
            });
        }
    };

    // Run both servers concurrently
    info!("Starting WebSocket and HTTP API servers...");
    tokio::select! {
        result = api_server => {
            error!("API server stopped: {:?}", result);
        }
        _ = websocket_server => {
            error!("WebSocket server stopped");
        }
    }

    Ok(())
}

async fn start_background_tasks(broker: Arc<RateBroker>, poll_interval_secs: u64) {
    // Rate polling task
    let poller = RatePoller::new(
        RateFetcher::new(RATES_URL),
        broker.clone(),
        Duration::from_secs(poll_interval_secs),
    );
    tokio::spawn(poller.run());

    // Stats task
    tokio::spawn(async move {
        let mut interval_timer = interval(Duration::from_secs(STATS_INTERVAL_SECS));

        loop {
            interval_timer.tick().await;
            let count = broker.subscriber_count();
            if count > 0 {
                info!("Stats - Subscribers: {}", count);
            }
        }
    });

    info!("Started rate polling task (every {} seconds)", poll_interval_secs);
    info!("Started stats monitoring task (every {} seconds)", STATS_INTERVAL_SECS);
}
