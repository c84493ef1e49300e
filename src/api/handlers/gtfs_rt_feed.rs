use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::models::{GtfsFeedId, GtfsRtFeed};
use crate::state::AppState;

use super::GtfsRtFeedRequest;

pub async fn list_gtfs_rt_feeds(State(state): State<AppState>) -> AppResult<Json<Vec<GtfsRtFeed>>> {
    let feeds = state.gtfs_rt_feeds.list().await?;
    Ok(Json(feeds))
}

pub async fn register_gtfs_rt_feed(
    State(state): State<AppState>,
    Json(request): Json<GtfsRtFeedRequest>,
) -> AppResult<Json<GtfsRtFeed>> {
    let gtfs_feed_id = GtfsFeedId(request.gtfs_feed_model.map(|m| m.feed_id).unwrap_or(0));
    let feed = state.gtfs_rt_feeds.register(request.gtfs_rt_url.as_deref(), gtfs_feed_id).await?;
    Ok(Json(feed))
}
