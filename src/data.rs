use crate::config::AppConfig;
use crate::types::lat_lon;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use geo::Point;
use std::fs::File;
use std::io::Read;
use tracing::{info, warn};

/// Points in file order, plus the number of rows that could not be used.
#[derive(Debug, Default)]
pub struct LoadedPoints {
    pub points: Vec<Point<f64>>,
    pub malformed: usize,
}

pub fn load_points(config: &AppConfig) -> Result<LoadedPoints> {
    let path = &config.input.points_csv;
    info!("Loading points from {:?}...", path);
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let loaded = read_points(file, config.input.has_headers)
        .with_context(|| format!("Failed to read CSV file: {:?}", path))?;
    info!(
        "Loaded {} points ({} malformed rows skipped)",
        loaded.points.len(),
        loaded.malformed
    );
    Ok(loaded)
}

/// Reads `lat, lon` rows. Rows that are too short or do not parse are skipped and counted;
/// a broken CSV stream is an error.
pub fn read_points<R: Read>(reader: R, has_headers: bool) -> Result<LoadedPoints> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut loaded = LoadedPoints::default();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let lat = record.get(0).and_then(|s| s.parse::<f64>().ok());
        let lon = record.get(1).and_then(|s| s.parse::<f64>().ok());

        match (lat, lon) {
            (Some(lat), Some(lon)) => loaded.points.push(lat_lon(lat, lon)),
            _ => {
                warn!(row, record = ?record, "Skipping malformed point row");
                loaded.malformed += 1;
            }
        }
    }

    Ok(loaded)
}
