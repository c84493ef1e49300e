use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::error::AppResult;
use crate::models::{
    CombinedIterationMessage, GtfsRtFeedId, GtfsRtFeedIteration, IterationErrorList, IterationId, MergeMonitorData,
    Session, SessionId,
};
use crate::services::{MonitorDataQuery, PastSessions};
use crate::state::AppState;

use super::{ClientQuery, IterationQuery, MonitorQuery};

pub async fn start_monitor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<MonitorQuery>,
) -> AppResult<Json<Session>> {
    let update_interval = query.update_interval.unwrap_or(state.config.monitor_interval);
    let enable_shapes = !query.enable_shapes.is_some_and(|s| s.eq_ignore_ascii_case("false"));
    let session = state
        .monitor
        .start_monitor(GtfsRtFeedId(id), query.client_id.unwrap_or_default(), update_interval, enable_shapes)
        .await?;
    Ok(Json(session))
}

pub async fn monitor_data(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<MonitorDataQuery>,
) -> AppResult<Json<MergeMonitorData>> {
    let data = state.monitor.monitor_data(GtfsRtFeedId(id), &query).await?;
    Ok(Json(data))
}

pub async fn feed_message(State(state): State<AppState>, Query(query): Query<IterationQuery>) -> AppResult<Json<Value>> {
    let message = state.monitor.feed_message(query.iteration_id, query.gtfs_rt_id).await?;
    Ok(Json(message))
}

pub async fn iteration_errors(
    State(state): State<AppState>,
    Query(query): Query<IterationQuery>,
) -> AppResult<Json<Vec<IterationErrorList>>> {
    let errors = state.monitor.iteration_errors(IterationId(query.iteration_id)).await?;
    Ok(Json(errors))
}

pub async fn iteration_summary(
    State(state): State<AppState>,
    Query(query): Query<IterationQuery>,
) -> AppResult<Json<GtfsRtFeedIteration>> {
    let iteration = state.monitor.iteration_summary(query.iteration_id, query.gtfs_rt_id).await?;
    Ok(Json(iteration))
}

pub async fn past_sessions(
    State(state): State<AppState>,
    Query(query): Query<ClientQuery>,
) -> AppResult<Json<PastSessions>> {
    let sessions = state.monitor.past_sessions(query.client_id.as_deref()).await?;
    Ok(Json(sessions))
}

pub async fn close_session(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Session>> {
    let session = state.monitor.close_session(SessionId(id)).await?;
    Ok(Json(session))
}

pub async fn message_details(
    State(state): State<AppState>,
    Path((_rt_id, iteration)): Path<(i64, i64)>,
) -> AppResult<Json<CombinedIterationMessage>> {
    let details = state.monitor.message_details(IterationId(iteration)).await?;
    Ok(Json(details))
}
