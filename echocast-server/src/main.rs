//! EchoCast Server
//!
//! The submission/status API: accepts URLs, exposes job status and episode
//! listings, and serves published audio. All processing happens in the
//! separately scheduled worker; the server only reads and writes the shared
//! on-disk stores.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod state;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echocast_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EchoCast server...");

    let config = Config::from_env();
    let state = AppState::open(&config).expect("Failed to open data directories");

    let app = api::create_router(state, config.episodes_dir());

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
