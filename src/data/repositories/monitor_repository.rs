use anyhow::Result;
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

use crate::base::{MonitorRepository, Page, TimeWindow};
use crate::data::database::DbPool;
use crate::models::{GtfsRtFeedId, IterationId, ViewErrorLog, ViewErrorSummary, ViewGtfsRtFeedErrorCount};

/// Iterations of one feed inside a fetch-time window that logged at least one rule,
/// numbered in fetch order. Binds rt_feed_id, start and end.
const ERROR_ITERATIONS: &str = "WITH error_iterations AS (
        SELECT i.iteration_id, i.rt_feed_id, i.iteration_timestamp, i.feed_timestamp,
               ROW_NUMBER() OVER (ORDER BY i.iteration_id) AS row_id
        FROM gtfs_rt_feed_iterations i
        WHERE i.rt_feed_id = ? AND i.iteration_timestamp BETWEEN ? AND ?
          AND EXISTS (SELECT 1 FROM message_logs m WHERE m.iteration_id = i.iteration_id)
    )";

/// SQLite implementation of the read-only monitoring queries
pub struct SqliteMonitorRepository {
    pool: DbPool,
}

impl SqliteMonitorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn window_values(rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Vec<Value> {
        vec![Value::Integer(rt_feed_id.0), Value::Integer(window.start), Value::Integer(window.end)]
    }

    fn push_page(values: &mut Vec<Value>, page: Page) {
        // SQLite treats a negative LIMIT as no limit
        values.push(Value::Integer(page.limit.unwrap_or(-1)));
        values.push(Value::Integer(page.offset));
    }

    fn map_summary(row: &Row) -> rusqlite::Result<ViewErrorSummary> {
        Ok(ViewErrorSummary {
            rt_feed_id: GtfsRtFeedId(row.get(0)?),
            id: row.get(1)?,
            severity: row.get(2)?,
            title: row.get(3)?,
            count: row.get(4)?,
            last_time: row.get(5)?,
            last_feed_time: row.get(6)?,
            last_iteration_id: IterationId(row.get(7)?),
            last_row_id: row.get(8)?,
            formatted_timestamp: String::new(),
            time_zone: None,
        })
    }

    fn map_log(row: &Row) -> rusqlite::Result<ViewErrorLog> {
        Ok(ViewErrorLog {
            row_id: row.get(0)?,
            rt_feed_id: GtfsRtFeedId(row.get(1)?),
            id: row.get(2)?,
            severity: row.get(3)?,
            title: row.get(4)?,
            iteration_id: IterationId(row.get(5)?),
            occurrence: row.get(6)?,
            logging_time: row.get(7)?,
            formatted_timestamp: String::new(),
            time_zone: None,
        })
    }

    fn count(&self, sql: &str, rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(sql, params![rt_feed_id.0, window.start, window.end], |row| row.get(0))?;
        Ok(count)
    }
}

#[async_trait]
impl MonitorRepository for SqliteMonitorRepository {
    async fn count_iterations(&self, rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM gtfs_rt_feed_iterations
             WHERE rt_feed_id = ? AND iteration_timestamp BETWEEN ? AND ?",
            rt_feed_id,
            window,
        )
    }

    async fn count_unique_iterations(&self, rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM gtfs_rt_feed_iterations
             WHERE rt_feed_id = ? AND iteration_timestamp BETWEEN ? AND ? AND feed_protobuf IS NOT NULL",
            rt_feed_id,
            window,
        )
    }

    async fn get_error_counts(&self, rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Result<Vec<ViewGtfsRtFeedErrorCount>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT m.error_id, COUNT(*)
             FROM message_logs m
             JOIN gtfs_rt_feed_iterations i ON i.iteration_id = m.iteration_id
             WHERE i.rt_feed_id = ? AND i.iteration_timestamp BETWEEN ? AND ?
             GROUP BY m.error_id
             ORDER BY m.error_id",
        )?;
        let counts = stmt
            .query_map(params![rt_feed_id.0, window.start, window.end], |row| {
                Ok(ViewGtfsRtFeedErrorCount { id: row.get(0)?, count: row.get(1)? })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }

    async fn get_error_summary(
        &self,
        rt_feed_id: GtfsRtFeedId,
        window: TimeWindow,
        page: Page,
    ) -> Result<Vec<ViewErrorSummary>> {
        let sql = format!(
            "{}
             SELECT e.rt_feed_id, m.error_id, r.severity, r.title, COUNT(*),
                    MAX(e.iteration_timestamp), MAX(e.feed_timestamp), MAX(e.iteration_id), MAX(e.row_id)
             FROM error_iterations e
             JOIN message_logs m ON m.iteration_id = e.iteration_id
             JOIN validation_rules r ON r.error_id = m.error_id
             GROUP BY m.error_id
             ORDER BY m.error_id
             LIMIT ? OFFSET ?",
            ERROR_ITERATIONS
        );

        let mut values = Self::window_values(rt_feed_id, window);
        Self::push_page(&mut values, page);

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let summary = stmt
            .query_map(params_from_iter(values), Self::map_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summary)
    }

    async fn get_error_log(
        &self,
        rt_feed_id: GtfsRtFeedId,
        window: TimeWindow,
        hidden_error_ids: &[String],
        page: Page,
    ) -> Result<Vec<ViewErrorLog>> {
        let mut values = Self::window_values(rt_feed_id, window);

        let hidden_filter = if hidden_error_ids.is_empty() {
            String::new()
        } else {
            let placeholders = vec!["?"; hidden_error_ids.len()].join(", ");
            values.extend(hidden_error_ids.iter().map(|id| Value::Text(id.clone())));
            format!("WHERE m.error_id NOT IN ({})", placeholders)
        };
        Self::push_page(&mut values, page);

        let sql = format!(
            "{}
             SELECT e.row_id, e.rt_feed_id, m.error_id, r.severity, r.title, e.iteration_id,
                    e.feed_timestamp, e.iteration_timestamp
             FROM error_iterations e
             JOIN message_logs m ON m.iteration_id = e.iteration_id
             JOIN validation_rules r ON r.error_id = m.error_id
             {}
             ORDER BY e.iteration_id DESC, m.error_id
             LIMIT ? OFFSET ?",
            ERROR_ITERATIONS, hidden_filter
        );

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let log = stmt
            .query_map(params_from_iter(values), Self::map_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(log)
    }

    async fn get_session_error_ids(&self, rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT m.error_id
             FROM message_logs m
             JOIN gtfs_rt_feed_iterations i ON i.iteration_id = m.iteration_id
             WHERE i.rt_feed_id = ? AND i.iteration_timestamp BETWEEN ? AND ?
             ORDER BY m.error_id",
        )?;
        let ids = stmt
            .query_map(params![rt_feed_id.0, window.start, window.end], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}
