/// Resolves the input (cached output, extracted CSV or zip archive) and
/// persists the cleaned dataset once.
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use zip::ZipArchive;

use crate::clean::{clean_data, CleanReport};
use crate::config::CleanConfig;
use crate::error::{CleanError, ElevationError};
use crate::progress::ProgressLine;
use crate::record::TrackRecord;
use crate::terrain_elevation::{ElevationProvider, TerrainTileProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetStatus {
    /// The cleaned dataset already existed; nothing was done.
    Cached(PathBuf),
    /// The dataset was cleaned and written during this call.
    Built { path: PathBuf, report: CleanReport },
}

/// Makes sure the cleaned dataset exists, using Terrarium tiles for
/// elevation.
pub fn ensure_dataset(config: &CleanConfig) -> Result<DatasetStatus, CleanError> {
    ensure_dataset_with(config, || TerrainTileProvider::new(config.terrain.clone()))
}

/// Like `ensure_dataset`, with the provider opened by `open_provider`. The
/// provider is only opened when cleaning actually runs and is dropped as soon
/// as it finishes.
pub fn ensure_dataset_with<P, F>(config: &CleanConfig, open_provider: F) -> Result<DatasetStatus, CleanError>
where
    P: ElevationProvider,
    F: FnOnce() -> Result<P, ElevationError>,
{
    let data_path = config.data_path();
    if data_path.exists() {
        info!(path = %data_path.display(), "cleaned dataset already present");
        return Ok(DatasetStatus::Cached(data_path));
    }

    let csv_path = config.csv_path();
    if !csv_path.exists() {
        let zip_path = config.zip_path();
        if !zip_path.exists() {
            return Err(CleanError::MissingInput {
                archive: zip_path,
                url: config.dataset_url.clone(),
            });
        }
        extract_archive(&zip_path, &config.data_dir)?;
        if !csv_path.exists() {
            return Err(CleanError::ArchiveWithoutCsv {
                archive: zip_path,
                csv: csv_path,
            });
        }
    }

    let raw = load_records(&csv_path)?;
    info!(rows = raw.len(), path = %csv_path.display(), "loaded raw tracks");

    let (cleaned, report) = {
        let mut provider = open_provider().map_err(CleanError::Provider)?;
        clean_data(raw, &mut provider, config)
    };

    write_records_atomically(&data_path, &cleaned)?;
    info!(rows = cleaned.len(), path = %data_path.display(), "cleaned dataset written");

    Ok(DatasetStatus::Built {
        path: data_path,
        report,
    })
}

/// Unpacks every entry of the archive into `dest`.
pub fn extract_archive(zip_path: &Path, dest: &Path) -> Result<(), CleanError> {
    let zip_err = |source| CleanError::Zip {
        path: zip_path.to_path_buf(),
        source,
    };

    let file = File::open(zip_path).map_err(|e| CleanError::io(zip_path, e))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;
    let mut progress = ProgressLine::stdout("Extracting file", archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| CleanError::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| CleanError::io(parent, e))?;
        }

        let total = entry.size();
        let mut out = BufWriter::new(File::create(&target).map_err(|e| CleanError::io(&target, e))?);
        let mut buffer = vec![0u8; 64 * 1024];
        let mut written = 0u64;
        loop {
            let n = io::Read::read(&mut entry, &mut buffer).map_err(|e| CleanError::io(zip_path, e))?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n]).map_err(|e| CleanError::io(&target, e))?;
            written += n as u64;
            progress.bar(written, total);
        }
        out.flush().map_err(|e| CleanError::io(&target, e))?;
    }
    progress.finish();
    info!(archive = %zip_path.display(), "archive extracted");
    Ok(())
}

pub fn load_records(path: &Path) -> Result<Vec<TrackRecord>, CleanError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| CleanError::csv(path, e))?;
    reader
        .deserialize()
        .collect::<Result<Vec<TrackRecord>, _>>()
        .map_err(|e| CleanError::csv(path, e))
}

/// Reads a dataset written by `ensure_dataset`.
pub fn load_cleaned(path: &Path) -> Result<Vec<TrackRecord>, CleanError> {
    load_records(path)
}

/// Writes to a sibling temp file and renames it over `path`, so `path`
/// either holds a complete dataset or does not exist. The temp file is
/// removed again when any step fails.
pub fn write_records_atomically(path: &Path, records: &[TrackRecord]) -> Result<(), CleanError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = write_records(&tmp_path, records)
        .and_then(|()| fs::rename(&tmp_path, path).map_err(|e| CleanError::io(path, e)));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_records(path: &Path, records: &[TrackRecord]) -> Result<(), CleanError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| CleanError::csv(path, e))?;
    for record in records {
        writer.serialize(record).map_err(|e| CleanError::csv(path, e))?;
    }
    writer.flush().map_err(|e| CleanError::io(path, e))
}
