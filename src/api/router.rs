use axum::Router;

use crate::state::AppState;

use super::handlers;

pub fn create_router(state: AppState) -> Router {
    use axum::routing::{delete, get, put};

    Router::new()
        // Static GTFS feeds
        .route(
            "/api/gtfs-feed",
            get(handlers::list_gtfs_feeds).post(handlers::register_gtfs_feed),
        )
        .route("/api/gtfs-feed/{id}", delete(handlers::delete_gtfs_feed))
        .route("/api/gtfs-feed/{id}/errorCount", get(handlers::gtfs_feed_error_count))
        // Realtime feeds
        .route(
            "/api/gtfs-rt-feed",
            get(handlers::list_gtfs_rt_feeds).post(handlers::register_gtfs_rt_feed),
        )
        // Monitoring
        .route("/api/gtfs-rt-feed/monitor/{id}", put(handlers::start_monitor))
        .route("/api/gtfs-rt-feed/monitor-data/{id}", get(handlers::monitor_data))
        .route("/api/gtfs-rt-feed/feedMessage", get(handlers::feed_message))
        .route("/api/gtfs-rt-feed/iterationErrors", get(handlers::iteration_errors))
        .route("/api/gtfs-rt-feed/iterationSummary", get(handlers::iteration_summary))
        .route("/api/gtfs-rt-feed/pastSessions", get(handlers::past_sessions))
        .route("/api/gtfs-rt-feed/{id}/closeSession", put(handlers::close_session))
        .route("/api/gtfs-rt-feed/{id}/{iteration}", get(handlers::message_details))
        .with_state(state)
}
