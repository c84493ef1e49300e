use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MONITOR_INTERVAL: u64 = 10;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Downloaded GTFS zips live under `<data_dir>/gtfs`
    pub data_dir: PathBuf,
    pub database: PathBuf,
    /// Seconds between monitor iterations when a client gives none
    pub monitor_interval: u64,
    pub user_agent: String,
}

impl Config {
    pub fn new(port: u16, data_dir: PathBuf, database: PathBuf) -> Self {
        Self {
            port,
            data_dir,
            database,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn gtfs_dir(&self) -> PathBuf {
        self.data_dir.join("gtfs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_PORT, PathBuf::from("data"), PathBuf::from("data/validator.db"))
    }
}
