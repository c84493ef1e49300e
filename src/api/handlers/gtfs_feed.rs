use axum::{
    extract::{Path, State},
    http::StatusCode,
    Form, Json,
};

use crate::error::AppResult;
use crate::models::{GtfsFeed, GtfsFeedId};
use crate::state::AppState;

use super::GtfsFeedForm;

pub async fn list_gtfs_feeds(State(state): State<AppState>) -> AppResult<Json<Vec<GtfsFeed>>> {
    let feeds = state.gtfs_feeds.list().await?;
    Ok(Json(feeds))
}

pub async fn register_gtfs_feed(
    State(state): State<AppState>,
    Form(form): Form<GtfsFeedForm>,
) -> AppResult<Json<GtfsFeed>> {
    let feed = state.gtfs_feeds.register(form.gtfsurl.trim(), form.enablevalidation.as_deref()).await?;
    Ok(Json(feed))
}

pub async fn delete_gtfs_feed(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<StatusCode> {
    state.gtfs_feeds.delete(GtfsFeedId(id)).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn gtfs_feed_error_count(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<GtfsFeed>> {
    let feed = state.gtfs_feeds.get(GtfsFeedId(id)).await?;
    Ok(Json(feed))
}
