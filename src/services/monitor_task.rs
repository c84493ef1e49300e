use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::base::{GtfsFeedRepository, GtfsRtFeedRepository, IterationRepository, MessageLogRepository};
use crate::data::Database;
use crate::models::{GtfsRtFeed, GtfsRtFeedId, GtfsRtFeedIteration, IterationId};
use crate::realtime::{combine_feeds, decode_feed, FeedMessage};
use crate::services::fetcher::Fetcher;
use crate::services::gtfs_cache::GtfsCache;
use crate::utils::current_time_millis;
use crate::validation::feed_utils::is_combined_feed;
use crate::validation::time::elapsed_time_string;
use crate::validation::{default_validators, FeedEntityValidator, IterationStatistics};

/// Everything a monitoring iteration needs, shared by all running monitors
pub struct MonitorContext {
    pub gtfs_feeds: Arc<dyn GtfsFeedRepository>,
    pub rt_feeds: Arc<dyn GtfsRtFeedRepository>,
    pub iterations: Arc<dyn IterationRepository>,
    pub message_logs: Arc<dyn MessageLogRepository>,
    pub fetcher: Arc<dyn Fetcher>,
    pub gtfs_cache: Arc<GtfsCache>,
    /// Last decoded message of every realtime feed, used to build combined feeds
    pub latest_messages: RwLock<HashMap<GtfsRtFeedId, FeedMessage>>,
    pub validators: Vec<Box<dyn FeedEntityValidator>>,
}

impl MonitorContext {
    pub fn new(database: &Database, fetcher: Arc<dyn Fetcher>, gtfs_cache: Arc<GtfsCache>) -> Self {
        Self {
            gtfs_feeds: database.gtfs_feed_repository(),
            rt_feeds: database.gtfs_rt_feed_repository(),
            iterations: database.iteration_repository(),
            message_logs: database.message_log_repository(),
            fetcher,
            gtfs_cache,
            latest_messages: RwLock::new(HashMap::new()),
            validators: default_validators(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// Same bytes as the previous iteration; stored without protobuf and not validated
    Duplicate(IterationId),
    Validated { iteration_id: IterationId, error_lists: usize, statistics: IterationStatistics },
}

/// One fetch-validate-persist cycle for a realtime feed
pub struct MonitorTask {
    context: Arc<MonitorContext>,
    rt_feed: GtfsRtFeed,
    enable_shapes: bool,
}

impl MonitorTask {
    pub fn new(context: Arc<MonitorContext>, rt_feed: GtfsRtFeed, enable_shapes: bool) -> Self {
        Self { context, rt_feed, enable_shapes }
    }

    pub fn rt_feed(&self) -> &GtfsRtFeed {
        &self.rt_feed
    }

    pub async fn run_iteration(&self) -> Result<IterationOutcome> {
        let started = Instant::now();
        let context = &self.context;
        let url = &self.rt_feed.gtfs_rt_url;
        let rt_feed_id = self.rt_feed.gtfs_rt_id;
        let mut statistics = IterationStatistics::default();

        let fetch_started = Instant::now();
        let bytes = context.fetcher.fetch(url).await.with_context(|| format!("Failed to download {}", url))?;
        statistics.to_byte_array_time = fetch_started.elapsed().as_secs_f64();
        let now_millis = current_time_millis();

        let hash = Sha256::digest(&bytes).to_vec();
        let unique = match context.iterations.get_latest_iteration(rt_feed_id).await? {
            Some(latest) => latest.feed_hash != hash,
            None => true,
        };

        let decode_started = Instant::now();
        let message = decode_feed(&bytes).with_context(|| format!("{} does not contain valid GTFS-realtime data", url))?;
        statistics.decode_protobuf_time = decode_started.elapsed().as_secs_f64();

        let feed_timestamp = message.header.timestamp.unwrap_or(0) as i64 * 1000;
        let iteration = context
            .iterations
            .create_iteration(&GtfsRtFeedIteration::new(
                rt_feed_id,
                now_millis,
                feed_timestamp,
                unique.then_some(bytes),
                hash,
            ))
            .await?;

        if !unique {
            info!("Iteration {} of {} repeats the previous feed, not validating", iteration.iteration_id, url);
            return Ok(IterationOutcome::Duplicate(iteration.iteration_id));
        }

        let previous = match context.iterations.get_previous_protobuf(rt_feed_id, iteration.iteration_id).await? {
            Some(bytes) => match decode_feed(&bytes) {
                Ok(previous) => Some(previous),
                Err(e) => {
                    warn!("Previous feed of {} could not be decoded: {:#}", url, e);
                    None
                }
            },
            None => None,
        };

        context.latest_messages.write().await.insert(rt_feed_id, message.clone());

        let siblings = context.rt_feeds.get_rt_feeds_by_gtfs_feed(self.rt_feed.gtfs_feed_id).await?;
        let combined = if siblings.len() > 1 {
            let latest = context.latest_messages.read().await;
            combine_feeds(siblings.iter().filter_map(|feed| latest.get(&feed.gtfs_rt_id)))
        } else if is_combined_feed(&message) {
            Some(message.clone())
        } else {
            None
        };

        let gtfs_feed = context
            .gtfs_feeds
            .get_feed(self.rt_feed.gtfs_feed_id)
            .await?
            .ok_or_else(|| anyhow!("GTFS feed {} no longer exists", self.rt_feed.gtfs_feed_id))?;
        let gtfs_started = Instant::now();
        let metadata = context.gtfs_cache.metadata(&gtfs_feed, self.enable_shapes).await?;
        statistics.gtfs_read_time = gtfs_started.elapsed().as_secs_f64();

        let mut error_lists = 0;
        for validator in &context.validators {
            let rule_started = Instant::now();
            let results =
                validator.validate(now_millis, &metadata, &message, previous.as_ref(), combined.as_ref());
            let elapsed = rule_started.elapsed().as_secs_f64();
            statistics.add_rule(validator.name(), elapsed);
            info!("{} - rule = {}", validator.name(), elapsed_time_string(elapsed));

            for errors in results.iter().filter(|e| !e.occurrence_list.is_empty()) {
                debug!("{} occurrence(s) of {} in {}", errors.occurrence_list.len(), errors.error_id(), url);
                context.message_logs.save_error_list(iteration.iteration_id, errors).await?;
                error_lists += 1;
            }
        }

        statistics.total_iteration_time = started.elapsed().as_secs_f64();
        info!(
            "Processed iteration {} of {} in {}",
            iteration.iteration_id,
            url,
            elapsed_time_string(statistics.total_iteration_time)
        );

        Ok(IterationOutcome::Validated { iteration_id: iteration.iteration_id, error_lists, statistics })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gtfs::tests::{sample_files, zip_bytes};
    use crate::models::{GtfsFeed, GtfsFeedId};
    use crate::realtime::{FeedEntity, TripDescriptor, TripUpdate};
    use crate::services::fetcher::tests::StubFetcher;
    use crate::validation::tests::message;
    use prost::Message;

    pub(crate) const RT_URL: &str = "http://rt.example/trip-updates";

    /// A trip update for a trip that is not in the GTFS data, which triggers E003
    pub(crate) fn unknown_trip_feed() -> Vec<u8> {
        let entity = FeedEntity {
            id: "1".to_string(),
            trip_update: Some(TripUpdate {
                trip: TripDescriptor { trip_id: Some("UNKNOWN".to_string()), ..Default::default() },
                ..Default::default()
            }),
            ..Default::default()
        };
        message(vec![entity]).encode_to_vec()
    }

    pub(crate) struct Fixture {
        pub database: Database,
        pub context: Arc<MonitorContext>,
        pub fetcher: Arc<StubFetcher>,
        pub rt_feed: GtfsRtFeed,
        pub _dir: tempfile::TempDir,
    }

    /// A database holding one GTFS feed (written to disk) and one realtime feed
    pub(crate) async fn fixture() -> Result<Fixture> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("gtfs.zip");
        std::fs::write(&path, zip_bytes(&sample_files())?)?;

        let database = Database::in_memory()?;
        let mut gtfs = GtfsFeed::new("http://gtfs.example/a.zip".into(), path.display().to_string(), vec![], 0);
        gtfs.agency = Some("America/New_York".into());
        let gtfs = database.gtfs_feed_repository().create_feed(&gtfs).await?;
        let rt_feed = database.gtfs_rt_feed_repository().create_rt_feed(RT_URL, gtfs.feed_id, true).await?;

        let fetcher = Arc::new(StubFetcher::default());
        let context = Arc::new(MonitorContext::new(&database, fetcher.clone(), Arc::new(GtfsCache::new())));
        Ok(Fixture { database, context, fetcher, rt_feed, _dir: dir })
    }

    #[tokio::test]
    async fn test_iteration_validates_and_skips_duplicates() -> Result<()> {
        let fixture = fixture().await?;
        fixture.fetcher.push(RT_URL, Ok(unknown_trip_feed()));
        let task = MonitorTask::new(fixture.context.clone(), fixture.rt_feed.clone(), true);

        let first = task.run_iteration().await?;
        let IterationOutcome::Validated { iteration_id, error_lists, statistics } = first else {
            panic!("expected a validated iteration, got {:?}", first);
        };
        assert!(error_lists > 0);
        assert_eq!(statistics.rule_statistics.len(), fixture.context.validators.len());

        let logs = fixture.database.message_log_repository().get_message_logs(iteration_id).await?;
        assert!(logs.iter().any(|l| l.error_id == "E003"));
        assert!(fixture.context.latest_messages.read().await.contains_key(&fixture.rt_feed.gtfs_rt_id));

        let second = task.run_iteration().await?;
        let IterationOutcome::Duplicate(duplicate_id) = second else {
            panic!("expected a duplicate iteration, got {:?}", second);
        };
        let stored = fixture.database.iteration_repository().get_iteration(duplicate_id).await?;
        assert!(stored.is_some_and(|i| !i.is_unique()));
        assert!(fixture.database.message_log_repository().get_message_logs(duplicate_id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_undecodable_feed_is_not_stored() -> Result<()> {
        let fixture = fixture().await?;
        fixture.fetcher.push(RT_URL, Ok(b"<html>".to_vec()));
        let task = MonitorTask::new(fixture.context.clone(), fixture.rt_feed.clone(), true);

        assert!(task.run_iteration().await.is_err());
        let latest = fixture.database.iteration_repository().get_latest_iteration(fixture.rt_feed.gtfs_rt_id).await?;
        assert!(latest.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_gtfs_feed_fails_iteration() -> Result<()> {
        let fixture = fixture().await?;
        fixture.fetcher.push(RT_URL, Ok(unknown_trip_feed()));
        let mut orphan = fixture.rt_feed.clone();
        orphan.gtfs_feed_id = GtfsFeedId(999);
        let task = MonitorTask::new(fixture.context.clone(), orphan, true);

        assert!(task.run_iteration().await.is_err());
        Ok(())
    }
}
