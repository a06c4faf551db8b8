/// Fixed run configuration.
///
/// There are no CLI flags; everything the run needs lives in
/// `CleanConfig::default()`. Tests build their own configs rooted in a
/// temporary directory.
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::terrain_elevation::TerrainConfig;

pub const ZIP_FILE: &str = "32068_41607_compressed_gpx-tracks-from-hikr.org.csv.zip";
pub const CSV_FILE: &str = "gpx-tracks-from-hikr.org.csv";
pub const DATA_FILE: &str = "tracks_clean.csv";
pub const DATASET_URL: &str = "https://www.kaggle.com/roccoli/gpx-hike-tracks";

#[derive(Debug, Clone)]
pub struct CleanConfig {
    /// Directory holding the archive, the extracted CSV and the cleaned output
    pub data_dir: PathBuf,
    pub zip_file: String,
    pub csv_file: String,
    pub data_file: String,
    pub dataset_url: String,
    pub thresholds: FilterThresholds,
    pub retry: RetryPolicy,
    pub terrain: TerrainConfig,
}

impl Default for CleanConfig {
    fn default() -> Self {
        CleanConfig {
            data_dir: PathBuf::from("."),
            zip_file: ZIP_FILE.to_string(),
            csv_file: CSV_FILE.to_string(),
            data_file: DATA_FILE.to_string(),
            dataset_url: DATASET_URL.to_string(),
            thresholds: FilterThresholds::default(),
            retry: RetryPolicy::default(),
            terrain: TerrainConfig::default(),
        }
    }
}

impl CleanConfig {
    /// Default configuration with every file resolved inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        CleanConfig {
            data_dir: dir.to_path_buf(),
            terrain: TerrainConfig {
                cache_dir: dir.join("srtm_cache"),
                ..TerrainConfig::default()
            },
            ..Default::default()
        }
    }

    pub fn zip_path(&self) -> PathBuf {
        self.data_dir.join(&self.zip_file)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.data_dir.join(&self.csv_file)
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(&self.data_file)
    }
}

/// Limits applied by the first filter pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterThresholds {
    pub max_speed_kmh: f64,
    pub min_length_m: f64,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        FilterThresholds {
            max_speed_kmh: 15.0,
            min_length_m: 1000.0,
        }
    }
}

/// How the enricher reacts to provider timeouts.
///
/// The default retries forever without waiting, so a provider that never
/// answers blocks the run. Set `max_attempts` to turn exhaustion into a
/// per-record failure instead.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RetryPolicy {
    /// Total attempts including the first; `None` means unbounded
    pub max_attempts: Option<u32>,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        RetryPolicy::default()
    }

    pub fn capped(max_attempts: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: Some(max_attempts.max(1)),
            backoff,
        }
    }

    /// Whether another attempt may follow `attempts_made` timed-out attempts.
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts_made < max,
            None => true,
        }
    }
}
