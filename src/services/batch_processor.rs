//! Offline validation of archived GTFS-realtime files against one GTFS zip.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use sha2::{Digest, Sha256};

use crate::gtfs::{load_zip, GtfsMetadata};
use crate::models::ErrorListHelperModel;
use crate::realtime::{decode_feed, FeedMessage};
use crate::validation::feed_utils::is_combined_feed;
use crate::validation::time::{elapsed_time_string, timestamp_from_file_name};
use crate::validation::{default_validators, IterationStatistics};

/// Suffix appended to each input file name for its validation results
pub const RESULTS_FILE_EXTENSION: &str = ".results.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    Name,
    #[default]
    DateModified,
}

pub struct BatchProcessorBuilder {
    gtfs_path: PathBuf,
    gtfs_realtime_path: PathBuf,
    sort_by: SortBy,
    plain_text_extension: Option<String>,
    return_statistics: bool,
    ignore_shapes: bool,
}

impl BatchProcessorBuilder {
    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    /// Also writes each decoded message as JSON to `<file>.<extension>`
    pub fn plain_text_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.plain_text_extension = Some(extension.trim_start_matches('.').to_string());
        self
    }

    pub fn return_statistics(mut self, return_statistics: bool) -> Self {
        self.return_statistics = return_statistics;
        self
    }

    pub fn ignore_shapes(mut self, ignore_shapes: bool) -> Self {
        self.ignore_shapes = ignore_shapes;
        self
    }

    pub fn build(self) -> BatchProcessor {
        BatchProcessor {
            gtfs_path: self.gtfs_path,
            gtfs_realtime_path: self.gtfs_realtime_path,
            sort_by: self.sort_by,
            plain_text_extension: self.plain_text_extension,
            return_statistics: self.return_statistics,
            ignore_shapes: self.ignore_shapes,
        }
    }
}

pub struct BatchProcessor {
    gtfs_path: PathBuf,
    gtfs_realtime_path: PathBuf,
    sort_by: SortBy,
    plain_text_extension: Option<String>,
    return_statistics: bool,
    ignore_shapes: bool,
}

impl BatchProcessor {
    pub fn builder(gtfs_path: impl Into<PathBuf>, gtfs_realtime_path: impl Into<PathBuf>) -> BatchProcessorBuilder {
        BatchProcessorBuilder {
            gtfs_path: gtfs_path.into(),
            gtfs_realtime_path: gtfs_realtime_path.into(),
            sort_by: SortBy::default(),
            plain_text_extension: None,
            return_statistics: false,
            ignore_shapes: false,
        }
    }

    /// Validates every realtime file in the directory, in order, writing results next to
    /// each one. Statistics are only collected when requested.
    pub fn process_feeds(&self) -> Result<Vec<IterationStatistics>> {
        info!("Starting batch processor...");
        let gtfs_started = Instant::now();
        let gtfs = load_zip(&self.gtfs_path)?;
        let gtfs_read_time = gtfs_started.elapsed().as_secs_f64();
        info!("Read {} in {}", self.gtfs_path.display(), elapsed_time_string(gtfs_read_time));

        let gtfs_url = fs::canonicalize(&self.gtfs_path).unwrap_or_else(|_| self.gtfs_path.clone());
        let metadata =
            GtfsMetadata::new(&gtfs_url.display().to_string(), gtfs.agency_timezone(), &gtfs, self.ignore_shapes);
        let validators = default_validators();

        info!("Sorting GTFS-rt files by {:?}...", self.sort_by);
        let paths = self.realtime_files()?;

        let mut all_statistics = Vec::new();
        let mut previous: Option<(Vec<u8>, FeedMessage)> = None;

        for path in paths {
            let started = Instant::now();
            let mut statistics = IterationStatistics { gtfs_read_time, ..Default::default() };
            let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

            let read_started = Instant::now();
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Error reading {}, skipping to next file: {}", path.display(), e);
                    continue;
                }
            };
            statistics.to_byte_array_time = read_started.elapsed().as_secs_f64();
            info!("Read {} to byte array in {}", file_name, elapsed_time_string(statistics.to_byte_array_time));

            let hash = Sha256::digest(&bytes).to_vec();
            if previous.as_ref().is_some_and(|(previous_hash, _)| *previous_hash == hash) {
                info!("{} is a duplicate of the previous file, skipping", file_name);
                continue;
            }

            let timestamp = self.file_timestamp(&path, &file_name)?;

            let decode_started = Instant::now();
            let message = match decode_feed(&bytes) {
                Ok(message) => message,
                Err(e) => {
                    error!("Error decoding {}, skipping to next file: {:#}", file_name, e);
                    continue;
                }
            };
            statistics.decode_protobuf_time = decode_started.elapsed().as_secs_f64();
            info!("Decoded {} protobuf in {}", file_name, elapsed_time_string(statistics.decode_protobuf_time));

            let combined = is_combined_feed(&message).then_some(&message);
            let previous_message = previous.as_ref().map(|(_, message)| message);

            let mut error_lists: Vec<ErrorListHelperModel> = Vec::new();
            for validator in &validators {
                let rule_started = Instant::now();
                error_lists.extend(validator.validate(timestamp, &metadata, &message, previous_message, combined));
                let elapsed = rule_started.elapsed().as_secs_f64();
                statistics.add_rule(validator.name(), elapsed);
                info!("{} - rule = {}", validator.name(), elapsed_time_string(elapsed));
            }
            statistics.total_iteration_time = started.elapsed().as_secs_f64();
            info!("Processed {} in {}", file_name, elapsed_time_string(statistics.total_iteration_time));

            self.write_results(&path, &error_lists)?;
            if let Some(extension) = &self.plain_text_extension {
                write_json(&output_path(&path, &format!(".{}", extension)), &message)?;
            }

            if self.return_statistics {
                all_statistics.push(statistics);
            }
            previous = Some((hash, message));
        }

        Ok(all_statistics)
    }

    fn realtime_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_files(&self.gtfs_realtime_path, &mut files)?;
        files.retain(|path| !self.is_output_file(path));

        match self.sort_by {
            SortBy::Name => files.sort_by(|a, b| a.file_name().cmp(&b.file_name())),
            SortBy::DateModified => {
                let mut dated = files
                    .into_iter()
                    .map(|path| Ok((modified_millis(&path)?, path)))
                    .collect::<Result<Vec<_>>>()?;
                dated.sort();
                files = dated.into_iter().map(|(_, path)| path).collect();
            }
        }
        Ok(files)
    }

    fn is_output_file(&self, path: &Path) -> bool {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        name.ends_with(RESULTS_FILE_EXTENSION)
            || self.plain_text_extension.as_ref().is_some_and(|ext| name.ends_with(&format!(".{}", ext)))
    }

    /// The moment the file represents: its name's timestamp when sorting by name, else its mtime
    fn file_timestamp(&self, path: &Path, file_name: &str) -> Result<i64> {
        if self.sort_by == SortBy::Name {
            match timestamp_from_file_name(file_name) {
                Ok(timestamp) => return Ok(timestamp),
                Err(e) => error!("{:#} - using date modified instead", e),
            }
        }
        modified_millis(path)
    }

    fn write_results(&self, path: &Path, error_lists: &[ErrorListHelperModel]) -> Result<()> {
        let non_empty: Vec<&ErrorListHelperModel> =
            error_lists.iter().filter(|e| !e.occurrence_list.is_empty()).collect();
        write_json(&output_path(path, RESULTS_FILE_EXTENSION), &non_empty)
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn modified_millis(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow!("Invalid modification time of {}: {}", path.display(), e))?;
    Ok(since_epoch.as_millis() as i64)
}

fn output_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::tests::{sample_files, zip_bytes};
    use crate::realtime::{FeedEntity, TripDescriptor, TripUpdate};
    use crate::validation::tests::message;
    use prost::Message;

    fn trip_update_feed(trip_id: &str) -> Vec<u8> {
        let entity = FeedEntity {
            id: "1".to_string(),
            trip_update: Some(TripUpdate {
                trip: TripDescriptor { trip_id: Some(trip_id.to_string()), ..Default::default() },
                ..Default::default()
            }),
            ..Default::default()
        };
        message(vec![entity]).encode_to_vec()
    }

    fn setup() -> Result<(tempfile::TempDir, PathBuf, PathBuf)> {
        let dir = tempfile::tempdir()?;
        let gtfs = dir.path().join("gtfs.zip");
        fs::write(&gtfs, zip_bytes(&sample_files())?)?;
        let realtime = dir.path().join("realtime");
        fs::create_dir(&realtime)?;
        Ok((dir, gtfs, realtime))
    }

    #[test]
    fn test_writes_results_and_skips_duplicates() -> Result<()> {
        let (_dir, gtfs, realtime) = setup()?;
        fs::write(realtime.join("TripUpdates-2017-02-18T20-01-08Z.pb"), trip_update_feed("UNKNOWN"))?;
        fs::write(realtime.join("TripUpdates-2017-02-18T20-01-38Z.pb"), trip_update_feed("UNKNOWN"))?;
        fs::write(realtime.join("TripUpdates-2017-02-18T20-02-08Z.pb"), trip_update_feed("T1"))?;
        fs::write(realtime.join("TripUpdates-2017-02-18T20-02-38Z.pb"), b"not a feed")?;

        let statistics = BatchProcessor::builder(&gtfs, &realtime)
            .sort_by(SortBy::Name)
            .plain_text_extension("txt")
            .return_statistics(true)
            .build()
            .process_feeds()?;

        assert_eq!(statistics.len(), 2);
        assert_eq!(statistics[0].rule_statistics.len(), default_validators().len());
        assert!(statistics[0].gtfs_read_time >= 0.0);

        let first = realtime.join("TripUpdates-2017-02-18T20-01-08Z.pb.results.json");
        let results: serde_json::Value = serde_json::from_str(&fs::read_to_string(first)?)?;
        let ids: Vec<&str> = results
            .as_array()
            .map(|lists| {
                lists.iter().filter_map(|l| l["errorMessage"]["validationRule"]["errorId"].as_str()).collect()
            })
            .unwrap_or_default();
        assert!(ids.contains(&"E003"));

        assert!(!realtime.join("TripUpdates-2017-02-18T20-01-38Z.pb.results.json").exists());
        assert!(realtime.join("TripUpdates-2017-02-18T20-02-08Z.pb.results.json").exists());
        assert!(realtime.join("TripUpdates-2017-02-18T20-02-08Z.pb.txt").exists());
        assert!(!realtime.join("TripUpdates-2017-02-18T20-02-38Z.pb.results.json").exists());
        Ok(())
    }

    #[test]
    fn test_rerun_ignores_previous_outputs() -> Result<()> {
        let (_dir, gtfs, realtime) = setup()?;
        fs::write(realtime.join("feed.pb"), trip_update_feed("T1"))?;
        let processor = BatchProcessor::builder(&gtfs, &realtime)
            .plain_text_extension(".txt")
            .return_statistics(true)
            .build();

        assert_eq!(processor.process_feeds()?.len(), 1);
        assert_eq!(processor.process_feeds()?.len(), 1);
        assert!(!realtime.join("feed.pb.results.json.results.json").exists());
        assert!(!realtime.join("feed.pb.txt.results.json").exists());
        Ok(())
    }

    #[test]
    fn test_statistics_only_when_requested() -> Result<()> {
        let (_dir, gtfs, realtime) = setup()?;
        fs::write(realtime.join("feed.pb"), trip_update_feed("T1"))?;
        let statistics = BatchProcessor::builder(&gtfs, &realtime).build().process_feeds()?;
        assert!(statistics.is_empty());
        assert!(realtime.join("feed.pb.results.json").exists());
        Ok(())
    }
}
