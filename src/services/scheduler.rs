use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::models::GtfsRtFeed;
use crate::services::monitor_task::{IterationOutcome, MonitorContext, MonitorTask};

struct ScheduledMonitor {
    handle: JoinHandle<()>,
    update_interval: u64,
    parallel_client_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStatus {
    /// Seconds between iterations
    pub update_interval: u64,
    pub parallel_client_count: usize,
}

/// Runs one polling task per realtime URL, shared by every client watching that URL
pub struct MonitorScheduler {
    context: Arc<MonitorContext>,
    running: RwLock<HashMap<String, ScheduledMonitor>>,
}

impl MonitorScheduler {
    pub fn new(context: Arc<MonitorContext>) -> Self {
        Self { context, running: RwLock::new(HashMap::new()) }
    }

    /// Adds a client to the feed's monitor, spawning it if needed. A client asking for a
    /// shorter interval than the running one restarts the task at that interval.
    pub async fn start(&self, rt_feed: &GtfsRtFeed, update_interval: u64, enable_shapes: bool) -> MonitorStatus {
        let mut running = self.running.write().await;
        let url = rt_feed.gtfs_rt_url.clone();

        if let Some(monitor) = running.get_mut(&url) {
            if update_interval < monitor.update_interval {
                info!("Restarting monitor of {} at {}s (was {}s)", url, update_interval, monitor.update_interval);
                monitor.handle.abort();
                monitor.handle = self.spawn(rt_feed.clone(), update_interval, enable_shapes);
            }
            monitor.update_interval = update_interval;
            monitor.parallel_client_count += 1;
            return MonitorStatus {
                update_interval: monitor.update_interval,
                parallel_client_count: monitor.parallel_client_count,
            };
        }

        info!("Starting monitor of {} every {}s", url, update_interval);
        let handle = self.spawn(rt_feed.clone(), update_interval, enable_shapes);
        running.insert(url, ScheduledMonitor { handle, update_interval, parallel_client_count: 1 });
        MonitorStatus { update_interval, parallel_client_count: 1 }
    }

    /// Removes one client; the task stops with the last one. Returns the clients left,
    /// or None when nothing was monitoring the URL.
    pub async fn release(&self, url: &str) -> Option<usize> {
        let mut running = self.running.write().await;
        let monitor = running.get_mut(url)?;

        if monitor.parallel_client_count > 1 {
            monitor.parallel_client_count -= 1;
            return Some(monitor.parallel_client_count);
        }

        if let Some(monitor) = running.remove(url) {
            monitor.handle.abort();
            info!("Stopped monitor of {}", url);
        }
        Some(0)
    }

    /// Stops the feed's monitor whatever its client count and forgets its last message.
    /// Used when the feed itself goes away.
    pub async fn stop(&self, rt_feed: &GtfsRtFeed) -> bool {
        let stopped = match self.running.write().await.remove(&rt_feed.gtfs_rt_url) {
            Some(monitor) => {
                monitor.handle.abort();
                info!("Stopped monitor of {} ({} client(s))", rt_feed.gtfs_rt_url, monitor.parallel_client_count);
                true
            }
            None => false,
        };
        self.context.latest_messages.write().await.remove(&rt_feed.gtfs_rt_id);
        stopped
    }

    pub async fn status(&self, url: &str) -> Option<MonitorStatus> {
        self.running.read().await.get(url).map(|m| MonitorStatus {
            update_interval: m.update_interval,
            parallel_client_count: m.parallel_client_count,
        })
    }

    pub async fn shutdown(&self) {
        let mut running = self.running.write().await;
        for (url, monitor) in running.drain() {
            monitor.handle.abort();
            debug!("Stopped monitor of {}", url);
        }
    }

    fn spawn(&self, rt_feed: GtfsRtFeed, update_interval: u64, enable_shapes: bool) -> JoinHandle<()> {
        let task = MonitorTask::new(self.context.clone(), rt_feed, enable_shapes);
        let period = Duration::from_secs(update_interval.max(1));

        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match task.run_iteration().await {
                    Ok(IterationOutcome::Validated { iteration_id, error_lists, .. }) => {
                        debug!("Iteration {} of {} logged {} rule(s)", iteration_id, task.rt_feed().gtfs_rt_url, error_lists)
                    }
                    Ok(IterationOutcome::Duplicate(_)) => {}
                    Err(e) => error!("Monitoring {} failed: {:#}", task.rt_feed().gtfs_rt_url, e),
                }
            }
        })
    }
}
