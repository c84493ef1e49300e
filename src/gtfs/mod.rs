pub mod geo;
pub mod metadata;
pub mod model;

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::de::DeserializeOwned;
use zip::ZipArchive;

pub use metadata::GtfsMetadata;
pub use model::{Agency, Frequency, Route, ShapePoint, Stop, StopTime, Trip};

/// Static GTFS tables needed for realtime validation
#[derive(Debug, Clone, Default)]
pub struct GtfsData {
    pub agencies: Vec<Agency>,
    pub routes: Vec<Route>,
    pub trips: Vec<Trip>,
    pub stops: Vec<Stop>,
    pub stop_times: Vec<StopTime>,
    pub frequencies: Vec<Frequency>,
    pub shape_points: Vec<ShapePoint>,
}

impl GtfsData {
    /// Timezone of the first agency, as the GTFS reference requires all agencies to share one
    pub fn agency_timezone(&self) -> Option<&str> {
        self.agencies.first().map(|a| a.agency_timezone.as_str())
    }
}

/// Reads a GTFS zip file from disk
pub fn load_zip<P: AsRef<Path>>(path: P) -> Result<GtfsData> {
    let path = path.as_ref();
    info!("Reading GTFS data from {}...", path.display());
    let file = File::open(path)
        .with_context(|| format!("Failed to open GTFS file: {}", path.display()))?;
    read_archive(file).with_context(|| format!("Failed to read GTFS zip: {}", path.display()))
}

/// Reads GTFS tables from any seekable zip source
pub fn read_archive<R: Read + Seek>(reader: R) -> Result<GtfsData> {
    let mut archive = ZipArchive::new(reader).context("Not a zip archive")?;

    let data = GtfsData {
        agencies: read_table(&mut archive, "agency.txt", true)?,
        routes: read_table(&mut archive, "routes.txt", true)?,
        trips: read_table(&mut archive, "trips.txt", true)?,
        stops: read_table(&mut archive, "stops.txt", true)?,
        stop_times: read_table(&mut archive, "stop_times.txt", true)?,
        frequencies: read_table(&mut archive, "frequencies.txt", false)?,
        shape_points: read_table(&mut archive, "shapes.txt", false)?,
    };

    debug!(
        "Loaded {} agencies, {} routes, {} trips, {} stops, {} stop_times, {} frequencies, {} shape points",
        data.agencies.len(),
        data.routes.len(),
        data.trips.len(),
        data.stops.len(),
        data.stop_times.len(),
        data.frequencies.len(),
        data.shape_points.len(),
    );
    Ok(data)
}

fn read_table<R, T>(archive: &mut ZipArchive<R>, name: &str, required: bool) -> Result<Vec<T>>
where
    R: Read + Seek,
    T: DeserializeOwned,
{
    // Some producers nest the tables inside a folder, so match on the file name only
    let mut index = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.name() == name || entry.name().ends_with(&format!("/{}", name)) {
            index = Some(i);
            break;
        }
    }

    let Some(index) = index else {
        if required {
            return Err(anyhow!("GTFS zip is missing required file {}", name));
        }
        return Ok(Vec::new());
    };

    let entry = archive.by_index(index)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(entry);

    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<T>().enumerate() {
        let row = record.with_context(|| format!("Invalid row {} in {}", line + 2, name))?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;

    /// Builds an in-memory zip out of (file name, contents) pairs
    pub(crate) fn zip_bytes(files: &[(&str, &str)]) -> Result<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in files {
            writer.start_file(*name, FileOptions::default())?;
            writer.write_all(contents.as_bytes())?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub(crate) fn sample_files() -> Vec<(&'static str, &'static str)> {
        vec![
            ("agency.txt", "agency_id,agency_name,agency_url,agency_timezone\n1,Transit,http://t.example,America/New_York\n"),
            ("routes.txt", "route_id,agency_id,route_short_name,route_type\nR1,1,1,3\n"),
            ("trips.txt", "route_id,service_id,trip_id,direction_id,block_id,shape_id\nR1,WK,T1,0,B1,S1\nR1,WK,T2,1,,\n"),
            ("stops.txt", "stop_id,stop_name,stop_lat,stop_lon,location_type\nA,Alpha,28.0,-82.0,\nB,Beta,28.01,-82.01,0\nST,Station,28.02,-82.02,1\n"),
            ("stop_times.txt", "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,08:05:00,08:05:00,B,2\nT1,08:00:00,08:00:00,A,1\nT2,9:00:00,9:00:00,A,1\n"),
        ]
    }

    #[test]
    fn test_read_archive_parses_tables() -> Result<()> {
        let bytes = zip_bytes(&sample_files())?;
        let data = read_archive(Cursor::new(bytes))?;

        assert_eq!(data.agency_timezone(), Some("America/New_York"));
        assert_eq!(data.trips.len(), 2);
        assert_eq!(data.trips[1].block_id, None);
        assert_eq!(data.stops[2].location_type(), 1);
        assert_eq!(data.stops[0].location_type(), 0);
        assert_eq!(data.stop_times[2].arrival_time, Some(32_400));
        assert!(data.frequencies.is_empty());
        assert!(data.shape_points.is_empty());
        Ok(())
    }

    #[test]
    fn test_read_archive_requires_core_tables() -> Result<()> {
        let bytes = zip_bytes(&[("agency.txt", "agency_id,agency_timezone\n1,UTC\n")])?;
        let err = read_archive(Cursor::new(bytes)).unwrap_err();
        assert!(err.to_string().contains("routes.txt"));
        Ok(())
    }

    #[test]
    fn test_load_zip_reports_missing_file() {
        let err = load_zip("/definitely/not/here/gtfs.zip").unwrap_err();
        assert!(err.to_string().contains("Failed to open GTFS file"));
    }
}
