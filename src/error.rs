use std::path::PathBuf;

use thiserror::Error;

/// A GPX string that could not be decoded or encoded.
#[derive(Debug, Error)]
pub enum TrackParseError {
    #[error("invalid GPX: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("serialized GPX is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failures raised by an elevation provider.
///
/// `Timeout` is the only variant the enricher retries; everything else marks
/// the record invalid.
#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("elevation lookup timed out: {0}")]
    Timeout(String),

    #[error("tile request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tile request {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("tile {url} is {width}x{height} pixels, expected 256x256")]
    TileSize { url: String, width: u32, height: u32 },

    #[error("tile could not be decoded: {0}")]
    Image(#[from] image::ImageError),

    #[error("tile cache I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// A difficulty label outside the hikr scale.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown difficulty label {0:?}")]
pub struct UnknownDifficulty(pub String);

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error(transparent)]
    Provider(#[from] ElevationError),

    #[error("elevation lookup still timing out after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Errors that abort the whole cleaning run.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("input data not found: download the dataset from {url} and save it as {}", .archive.display())]
    MissingInput { archive: PathBuf, url: String },

    #[error("archive {} does not contain {}", .archive.display(), .csv.display())]
    ArchiveWithoutCsv { archive: PathBuf, csv: PathBuf },

    #[error("could not open elevation provider: {0}")]
    Provider(#[source] ElevationError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("zip error in {}: {source}", .path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl CleanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CleanError::Io { path: path.into(), source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        CleanError::Csv { path: path.into(), source }
    }
}
