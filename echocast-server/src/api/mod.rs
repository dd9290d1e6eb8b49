//! API Module
//!
//! HTTP API layer for the submission/status server.
//! Each submodule handles endpoints for a specific domain.

pub mod episode;
pub mod error;
pub mod health;
pub mod job;

use std::path::PathBuf;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints.
///
/// `episodes_dir` is served statically under `/episodes` so feed enclosure
/// URLs resolve against the same process.
pub fn create_router(state: AppState, episodes_dir: PathBuf) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/job/submit", post(job::submit_job))
        .route("/job/list", get(job::list_jobs))
        .route("/job/{id}", get(job::get_job))
        .route("/job/{id}/cancel", post(job::cancel_job))
        // Episode endpoints
        .route("/episode/list", get(episode::list_episodes))
        .nest_service("/episodes", ServeDir::new(episodes_dir))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
