//! Episode API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use echocast_core::domain::episode::Episode;
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

/// GET /episode/list
/// List published episodes, newest first.
pub async fn list_episodes(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> ApiResult<Json<Vec<Episode>>> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);
    tracing::debug!("Listing episodes (limit {}, offset {})", limit, offset);

    let episodes = state.episodes.list()?;
    Ok(Json(episodes.into_iter().skip(offset).take(limit).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}
