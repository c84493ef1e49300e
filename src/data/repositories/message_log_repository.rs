use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Row};

use crate::base::MessageLogRepository;
use crate::data::database::DbPool;
use crate::models::{
    ErrorListHelperModel, IterationErrorList, IterationId, MessageId, MessageLog, Occurrence, ViewIterationError,
};

pub struct SqliteMessageLogRepository {
    pool: DbPool,
}

impl SqliteMessageLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_message_log(row: &Row) -> rusqlite::Result<MessageLog> {
        Ok(MessageLog {
            message_id: MessageId(row.get(0)?),
            iteration_id: IterationId(row.get(1)?),
            error_id: row.get(2)?,
            error_details: row.get(3)?,
        })
    }

    fn map_occurrence(row: &Row) -> rusqlite::Result<Occurrence> {
        Ok(Occurrence { occurrence_id: row.get(0)?, message_id: MessageId(row.get(1)?), prefix: row.get(2)? })
    }
}

#[async_trait]
impl MessageLogRepository for SqliteMessageLogRepository {
    async fn save_error_list(&self, iteration_id: IterationId, errors: &ErrorListHelperModel) -> Result<MessageId> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO message_logs (iteration_id, error_id, error_details) VALUES (?, ?, NULL)",
            params![iteration_id.0, errors.error_id()],
        )?;
        let message_id = MessageId(tx.last_insert_rowid());

        {
            let mut stmt = tx.prepare("INSERT INTO occurrences (message_id, prefix) VALUES (?, ?)")?;
            for occurrence in &errors.occurrence_list {
                stmt.execute(params![message_id.0, occurrence.prefix])?;
            }
        }
        tx.commit()?;

        debug!(
            "Saved {} occurrence(s) of {} for iteration {}",
            errors.occurrence_list.len(),
            errors.error_id(),
            iteration_id
        );
        Ok(message_id)
    }

    async fn get_message_logs(&self, iteration_id: IterationId) -> Result<Vec<MessageLog>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT message_id, iteration_id, error_id, error_details FROM message_logs
             WHERE iteration_id = ? ORDER BY message_id",
        )?;
        let logs = stmt
            .query_map(params![iteration_id.0], Self::map_message_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    async fn get_occurrences(&self, message_id: MessageId) -> Result<Vec<Occurrence>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT occurrence_id, message_id, prefix FROM occurrences WHERE message_id = ? ORDER BY occurrence_id",
        )?;
        let occurrences = stmt
            .query_map(params![message_id.0], Self::map_occurrence)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(occurrences)
    }

    async fn get_iteration_errors(&self, iteration_id: IterationId) -> Result<Vec<IterationErrorList>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT ROW_NUMBER() OVER (PARTITION BY m.message_id ORDER BY o.occurrence_id) AS row_id,
                    m.error_id, r.title, o.prefix
             FROM message_logs m
             JOIN occurrences o ON o.message_id = m.message_id
             JOIN validation_rules r ON r.error_id = m.error_id
             WHERE m.iteration_id = ?
             ORDER BY m.error_id, m.message_id, o.occurrence_id",
        )?;
        let rows = stmt
            .query_map(params![iteration_id.0], |row| {
                Ok(ViewIterationError {
                    row_id: row.get(0)?,
                    iteration_id,
                    error_id: row.get(1)?,
                    title: row.get(2)?,
                    occurrence_prefix: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut lists: Vec<IterationErrorList> = Vec::new();
        for row in rows {
            // a new list starts at row 1 of each message log
            match lists.last_mut() {
                Some(list) if row.row_id > 1 => {
                    list.error_occurrences += 1;
                    list.view_iteration_errors_model_list.push(row);
                }
                _ => lists.push(IterationErrorList {
                    error_id: row.error_id.clone(),
                    title: row.title.clone(),
                    error_occurrences: 1,
                    view_iteration_errors_model_list: vec![row],
                }),
            }
        }
        Ok(lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repositories::tests::{create_iteration, create_rt_feed};
    use crate::data::Database;
    use crate::models::{MessageLogModel, OccurrenceModel};
    use crate::validation::rules::{E004, W001};

    fn error_list(rule: crate::models::ValidationRule, prefixes: &[&str]) -> ErrorListHelperModel {
        ErrorListHelperModel {
            error_message: MessageLogModel { validation_rule: rule },
            occurrence_list: prefixes.iter().map(|p| OccurrenceModel::new(*p)).collect(),
        }
    }

    #[tokio::test]
    async fn test_save_and_group_iteration_errors() -> Result<()> {
        let database = Database::in_memory()?;
        let rt_feed = create_rt_feed(&database).await?;
        let iteration = create_iteration(&database, rt_feed.gtfs_rt_id, 1_000, Some(vec![1])).await?;
        let repository = database.message_log_repository();

        let warning = repository.save_error_list(iteration.iteration_id, &error_list(W001, &["entity ID 1"])).await?;
        repository
            .save_error_list(iteration.iteration_id, &error_list(E004, &["route_id X", "route_id Y"]))
            .await?;

        let logs = repository.get_message_logs(iteration.iteration_id).await?;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].error_id, "W001");
        assert_eq!(repository.get_occurrences(warning).await?[0].prefix, "entity ID 1");

        let grouped = repository.get_iteration_errors(iteration.iteration_id).await?;
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].error_id, "E004");
        assert_eq!(grouped[0].error_occurrences, 2);
        let row_ids: Vec<i64> = grouped[0].view_iteration_errors_model_list.iter().map(|r| r.row_id).collect();
        assert_eq!(row_ids, vec![1, 2]);
        assert_eq!(grouped[1].error_id, "W001");
        assert_eq!(grouped[1].view_iteration_errors_model_list[0].occurrence_prefix, "entity ID 1");
        Ok(())
    }
}
