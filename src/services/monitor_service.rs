use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::base::{
    GtfsFeedRepository, GtfsRtFeedRepository, IterationRepository, MessageLogRepository, MonitorRepository, Page,
    SessionRepository, TimeWindow,
};
use crate::data::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    CombinedIterationMessage, CombinedMessageOccurrence, GtfsRtFeed, GtfsRtFeedId, GtfsRtFeedIteration,
    IterationErrorList, IterationId, IterationMessage, MergeMonitorData, Session, SessionId, SessionView,
};
use crate::realtime::decode_feed;
use crate::services::scheduler::MonitorScheduler;
use crate::utils::{
    current_time_millis, format_monitor_timestamp, format_session_time, format_total_time, parse_time_zone,
};

/// Query string of the monitor-data endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorDataQuery {
    pub summary_cur_page: i64,
    pub summary_rows_per_page: i64,
    /// Comma separated rule ids hidden from the error log
    pub toggled_data: Option<String>,
    pub log_cur_page: i64,
    pub log_rows_per_page: i64,
    pub start_time: i64,
    pub end_time: i64,
}

impl MonitorDataQuery {
    pub fn hidden_error_ids(&self) -> Vec<String> {
        self.toggled_data
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PastSessions {
    NewClient {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    Sessions(Vec<SessionView>),
}

/// Session bookkeeping and the read side of monitoring
pub struct MonitorService {
    gtfs_feeds: Arc<dyn GtfsFeedRepository>,
    rt_feeds: Arc<dyn GtfsRtFeedRepository>,
    iterations: Arc<dyn IterationRepository>,
    message_logs: Arc<dyn MessageLogRepository>,
    sessions: Arc<dyn SessionRepository>,
    monitor: Arc<dyn MonitorRepository>,
    scheduler: Arc<MonitorScheduler>,
}

impl MonitorService {
    pub fn new(database: &Database, scheduler: Arc<MonitorScheduler>) -> Self {
        Self {
            gtfs_feeds: database.gtfs_feed_repository(),
            rt_feeds: database.gtfs_rt_feed_repository(),
            iterations: database.iteration_repository(),
            message_logs: database.message_log_repository(),
            sessions: database.session_repository(),
            monitor: database.monitor_repository(),
            scheduler,
        }
    }

    async fn rt_feed(&self, id: GtfsRtFeedId) -> AppResult<GtfsRtFeed> {
        self.rt_feeds
            .get_rt_feed(id)
            .await?
            .ok_or_else(|| AppError::not_found("GTFS-RT feed not found", format!("No GTFS-RT feed with id {}", id)))
    }

    async fn iteration(&self, id: IterationId) -> AppResult<GtfsRtFeedIteration> {
        self.iterations
            .get_iteration(id)
            .await?
            .ok_or_else(|| AppError::not_found("Iteration not found", format!("No iteration with id {}", id)))
    }

    /// Time zone id of the agency behind a realtime feed
    async fn agency_time_zone(&self, rt_feed: &GtfsRtFeed) -> AppResult<Option<String>> {
        Ok(self.gtfs_feeds.get_feed(rt_feed.gtfs_feed_id).await?.and_then(|f| f.agency))
    }

    pub async fn start_monitor(
        &self,
        id: GtfsRtFeedId,
        client_id: String,
        update_interval: u64,
        enable_shapes: bool,
    ) -> AppResult<Session> {
        let rt_feed = self.rt_feed(id).await?;
        let session = self.sessions.create_session(&Session::new(id, client_id, current_time_millis())).await?;

        if rt_feed.enable_shapes != enable_shapes {
            self.rt_feeds.set_enable_shapes(id, enable_shapes).await?;
        }
        let status = self.scheduler.start(&rt_feed, update_interval, enable_shapes).await;
        info!(
            "Session {} monitors {} ({} client(s), every {}s)",
            session.session_id, rt_feed.gtfs_rt_url, status.parallel_client_count, status.update_interval
        );
        Ok(session)
    }

    pub async fn monitor_data(&self, id: GtfsRtFeedId, query: &MonitorDataQuery) -> AppResult<MergeMonitorData> {
        let rt_feed = self.rt_feed(id).await?;
        let now = current_time_millis();

        let start = if query.start_time > 0 {
            query.start_time
        } else {
            self.sessions.get_latest_session_start(id).await?.unwrap_or(0)
        };
        let end = if query.end_time > 0 { query.end_time } else { now };
        let window = TimeWindow { start, end };

        let agency = self.agency_time_zone(&rt_feed).await?;
        let time_zone = parse_time_zone(agency.as_deref());

        let mut summary = self
            .monitor
            .get_error_summary(id, window, Page::new(query.summary_cur_page, query.summary_rows_per_page))
            .await?;
        for row in &mut summary {
            row.formatted_timestamp = format_monitor_timestamp(row.last_feed_time, now, time_zone);
            row.last_feed_time /= 1000;
            row.time_zone = agency.clone();
        }

        let hidden = query.hidden_error_ids();
        let mut log = self
            .monitor
            .get_error_log(id, window, &hidden, Page::new(query.log_cur_page, query.log_rows_per_page))
            .await?;
        for row in &mut log {
            row.formatted_timestamp = format_monitor_timestamp(row.occurrence, now, time_zone);
            row.occurrence /= 1000;
            row.time_zone = agency.clone();
        }

        Ok(MergeMonitorData {
            iteration_count: self.monitor.count_iterations(id, window).await?,
            unique_feed_count: self.monitor.count_unique_iterations(id, window).await?,
            view_error_summary_model_list: summary,
            view_error_log_model_list: log,
            view_gtfs_rt_feed_error_count_model_list: self.monitor.get_error_counts(id, window).await?,
        })
    }

    /// The stored feed of an iteration as JSON; iteration -1 means the latest stored feed of `gtfs_rt_id`
    pub async fn feed_message(&self, iteration_id: i64, gtfs_rt_id: i64) -> AppResult<serde_json::Value> {
        let iteration = if iteration_id == -1 {
            self.iterations.get_latest_stored_iteration(GtfsRtFeedId(gtfs_rt_id)).await?
        } else {
            self.iterations.get_iteration(IterationId(iteration_id)).await?
        };

        let protobuf = iteration
            .and_then(|i| i.feed_protobuf)
            .ok_or_else(|| AppError::not_found("Feed message not found", "No stored feed for this iteration"))?;
        let message = decode_feed(&protobuf)?;
        Ok(serde_json::to_value(&message).map_err(anyhow::Error::from)?)
    }

    pub async fn iteration_errors(&self, iteration_id: IterationId) -> AppResult<Vec<IterationErrorList>> {
        Ok(self.message_logs.get_iteration_errors(iteration_id).await?)
    }

    /// An iteration with its feed time formatted in the agency zone; a negative id picks
    /// the latest iteration of `gtfs_rt_id`
    pub async fn iteration_summary(&self, iteration_id: i64, gtfs_rt_id: i64) -> AppResult<GtfsRtFeedIteration> {
        let mut iteration = if iteration_id > -1 {
            self.iteration(IterationId(iteration_id)).await?
        } else {
            self.iterations
                .get_latest_iteration(GtfsRtFeedId(gtfs_rt_id))
                .await?
                .ok_or_else(|| AppError::not_found("Iteration not found", "The feed has no iterations yet"))?
        };

        let rt_feed = self.rt_feed(iteration.rt_feed_id).await?;
        let time_zone = parse_time_zone(self.agency_time_zone(&rt_feed).await?.as_deref());
        iteration.date_format =
            Some(format_monitor_timestamp(iteration.feed_timestamp, current_time_millis(), time_zone));
        iteration.feed_timestamp /= 1000;
        Ok(iteration)
    }

    /// Sessions of a client, or a fresh client id when none is given
    pub async fn past_sessions(&self, client_id: Option<&str>) -> AppResult<PastSessions> {
        let client_id = client_id.unwrap_or_default();
        if client_id.is_empty() {
            return Ok(PastSessions::NewClient { client_id: Uuid::new_v4().to_string() });
        }

        let sessions = self.sessions.get_sessions_by_client(client_id).await?;
        let views = sessions
            .into_iter()
            .enumerate()
            .map(|(index, session)| SessionView {
                row_id: index + 1,
                start_time_format: format_session_time(session.session_start_time),
                end_time_format: format_session_time(session.session_end_time),
                total_time: format_total_time(session.session_end_time - session.session_start_time),
                session,
            })
            .collect();
        Ok(PastSessions::Sessions(views))
    }

    /// Ends a session, counts the distinct rules it saw and releases its monitor
    pub async fn close_session(&self, session_id: SessionId) -> AppResult<Session> {
        let mut session = self.sessions.get_session(session_id).await?.ok_or_else(|| {
            AppError::not_found("Session not found", format!("No session with id {}", session_id))
        })?;
        if session.session_end_time != 0 {
            // already closed, its client was released then
            return Ok(session);
        }
        let rt_feed = self.rt_feed(session.rt_feed_id).await?;

        session.session_end_time = current_time_millis();
        let window = TimeWindow { start: session.session_start_time, end: session.session_end_time };
        let error_ids = self.monitor.get_session_error_ids(session.rt_feed_id, window).await?;
        let warnings = error_ids.iter().filter(|id| id.starts_with('W')).count() as i64;
        session.warning_count = warnings;
        session.error_count = error_ids.len() as i64 - warnings;
        self.sessions.update_session(&session).await?;

        let remaining = self.scheduler.release(&rt_feed.gtfs_rt_url).await;
        info!(
            "Closed session {} with {} error(s) and {} warning(s), {} client(s) left on {}",
            session.session_id,
            session.error_count,
            session.warning_count,
            remaining.unwrap_or(0),
            rt_feed.gtfs_rt_url
        );
        Ok(session)
    }

    /// An iteration with its decoded feed and everything logged for it
    pub async fn message_details(&self, iteration_id: IterationId) -> AppResult<CombinedIterationMessage> {
        let iteration = self.iteration(iteration_id).await?;
        let feed_message = match &iteration.feed_protobuf {
            Some(bytes) => Some(serde_json::to_value(decode_feed(bytes)?).map_err(anyhow::Error::from)?),
            None => None,
        };

        let mut message_occurrence_list = Vec::new();
        for message_log in self.message_logs.get_message_logs(iteration_id).await? {
            let occurrence_models = self.message_logs.get_occurrences(message_log.message_id).await?;
            message_occurrence_list.push(CombinedMessageOccurrence { message_log_model: message_log, occurrence_models });
        }

        Ok(CombinedIterationMessage {
            gtfs_feed_iteration_model: IterationMessage {
                iteration_id: iteration.iteration_id,
                rt_feed_id: iteration.rt_feed_id,
                time_stamp: iteration.iteration_timestamp,
                feed_message,
            },
            message_occurrence_list,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repositories::tests::{create_iteration, save_errors};
    use crate::services::monitor_task::tests::{fixture, unknown_trip_feed, Fixture, RT_URL};
    use crate::validation::rules::{E004, E012, W001};
    use anyhow::Result;

    fn service(fixture: &Fixture) -> (MonitorService, Arc<MonitorScheduler>) {
        let scheduler = Arc::new(MonitorScheduler::new(fixture.context.clone()));
        (MonitorService::new(&fixture.database, scheduler.clone()), scheduler)
    }

    #[test]
    fn test_hidden_error_ids_skip_empty_entries() {
        let query = MonitorDataQuery { toggled_data: Some("E004,,W001, ".into()), ..Default::default() };
        assert_eq!(query.hidden_error_ids(), vec!["E004".to_string(), "W001".to_string()]);
        assert!(MonitorDataQuery::default().hidden_error_ids().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_close_session_counts_rules() -> Result<()> {
        let fixture = fixture().await?;
        fixture.fetcher.push(RT_URL, Ok(unknown_trip_feed()));
        let (service, scheduler) = service(&fixture);
        let rt_id = fixture.rt_feed.gtfs_rt_id;

        let session = service.start_monitor(rt_id, "client-a".into(), 3600, false).await?;
        assert_eq!(scheduler.status(RT_URL).await.map(|s| s.parallel_client_count), Some(1));
        let stored = fixture.database.gtfs_rt_feed_repository().get_rt_feed(rt_id).await?;
        assert_eq!(stored.map(|f| f.enable_shapes), Some(false));

        let now = current_time_millis();
        let first = create_iteration(&fixture.database, rt_id, now, Some(vec![1])).await?;
        save_errors(&fixture.database, first.iteration_id, E004, &["route_id X"]).await?;
        save_errors(&fixture.database, first.iteration_id, W001, &["entity ID 1"]).await?;
        let second = create_iteration(&fixture.database, rt_id, now, Some(vec![2])).await?;
        save_errors(&fixture.database, second.iteration_id, E004, &["route_id Y"]).await?;
        save_errors(&fixture.database, second.iteration_id, E012, &["trip_id 1"]).await?;

        let closed = service.close_session(session.session_id).await?;
        // the spawned monitor may have logged its own iteration in the meantime
        assert!(closed.warning_count >= 1);
        assert!(closed.error_count >= 2);
        assert!(closed.session_end_time >= closed.session_start_time);
        assert_eq!(scheduler.status(RT_URL).await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_closing_session_twice_keeps_other_client() -> Result<()> {
        let fixture = fixture().await?;
        fixture.fetcher.push(RT_URL, Ok(unknown_trip_feed()));
        fixture.fetcher.push(RT_URL, Ok(unknown_trip_feed()));
        let (service, scheduler) = service(&fixture);
        let rt_id = fixture.rt_feed.gtfs_rt_id;

        let first = service.start_monitor(rt_id, "client-a".into(), 3600, false).await?;
        service.start_monitor(rt_id, "client-b".into(), 3600, false).await?;
        assert_eq!(scheduler.status(RT_URL).await.map(|s| s.parallel_client_count), Some(2));

        let closed = service.close_session(first.session_id).await?;
        let closed_again = service.close_session(first.session_id).await?;
        assert_eq!(closed_again.session_end_time, closed.session_end_time);
        assert_eq!(scheduler.status(RT_URL).await.map(|s| s.parallel_client_count), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_monitor_data_formats_and_pages() -> Result<()> {
        let fixture = fixture().await?;
        let (service, _) = service(&fixture);
        let rt_id = fixture.rt_feed.gtfs_rt_id;

        let now = current_time_millis();
        let first = create_iteration(&fixture.database, rt_id, now - 2_000, Some(vec![1])).await?;
        save_errors(&fixture.database, first.iteration_id, E004, &["route_id X"]).await?;
        save_errors(&fixture.database, first.iteration_id, W001, &["entity ID 1"]).await?;
        create_iteration(&fixture.database, rt_id, now - 1_000, None).await?;

        let query = MonitorDataQuery {
            summary_cur_page: 1,
            summary_rows_per_page: 1,
            toggled_data: Some("W001".into()),
            log_cur_page: 1,
            log_rows_per_page: 10,
            start_time: now - 10_000,
            end_time: now + 10_000,
        };
        let data = service.monitor_data(rt_id, &query).await?;

        assert_eq!(data.iteration_count, 2);
        assert_eq!(data.unique_feed_count, 1);
        assert_eq!(data.view_gtfs_rt_feed_error_count_model_list.len(), 2);

        assert_eq!(data.view_error_summary_model_list.len(), 1);
        let summary = &data.view_error_summary_model_list[0];
        assert_eq!(summary.id, "E004");
        assert_eq!(summary.last_feed_time, (now - 2_100) / 1000);
        assert_eq!(summary.time_zone.as_deref(), Some("America/New_York"));
        assert!(summary.formatted_timestamp.ends_with('M'));

        assert_eq!(data.view_error_log_model_list.len(), 1);
        assert_eq!(data.view_error_log_model_list[0].id, "E004");
        assert_eq!(data.view_error_log_model_list[0].row_id, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_iteration_queries() -> Result<()> {
        let fixture = fixture().await?;
        fixture.fetcher.push(RT_URL, Ok(unknown_trip_feed()));
        let (service, _) = service(&fixture);
        let rt_id = fixture.rt_feed.gtfs_rt_id;

        let task = crate::services::MonitorTask::new(fixture.context.clone(), fixture.rt_feed.clone(), true);
        task.run_iteration().await?;
        let duplicate = task.run_iteration().await?;
        let crate::services::IterationOutcome::Duplicate(duplicate_id) = duplicate else {
            panic!("expected a duplicate, got {:?}", duplicate);
        };

        let latest = service.feed_message(-1, rt_id.0).await?;
        assert_eq!(latest["entity"][0]["id"], "1");

        let summary = service.iteration_summary(-1, rt_id.0).await?;
        assert_eq!(summary.iteration_id, duplicate_id);
        assert!(summary.date_format.is_some());

        assert!(matches!(service.feed_message(duplicate_id.0, 0).await, Err(AppError::NotFound { .. })));

        let stored = fixture.database.iteration_repository().get_latest_stored_iteration(rt_id).await?;
        let stored_id = stored.map(|i| i.iteration_id).unwrap_or(IterationId(0));
        let errors = service.iteration_errors(stored_id).await?;
        assert!(errors.iter().any(|e| e.error_id == "E003"));

        let details = service.message_details(stored_id).await?;
        assert!(details.gtfs_feed_iteration_model.feed_message.is_some());
        assert_eq!(details.message_occurrence_list.len(), errors.len());
        Ok(())
    }

    #[tokio::test]
    async fn test_past_sessions() -> Result<()> {
        let fixture = fixture().await?;
        let (service, _) = service(&fixture);

        let PastSessions::NewClient { client_id } = service.past_sessions(None).await? else {
            panic!("expected a new client id");
        };
        assert_eq!(client_id.len(), 36);

        let mut session = Session::new(fixture.rt_feed.gtfs_rt_id, "client-a".into(), 1_000);
        session = fixture.database.session_repository().create_session(&session).await?;
        session.session_end_time = 1_000 + 3_723_000;
        fixture.database.session_repository().update_session(&session).await?;

        let PastSessions::Sessions(views) = service.past_sessions(Some("client-a")).await? else {
            panic!("expected sessions");
        };
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].row_id, 1);
        assert_eq!(views[0].total_time, "1h 2m 3s");
        assert_eq!(views[0].start_time_format.len(), "01/01/1970 00:00:01".len());
        Ok(())
    }
}
