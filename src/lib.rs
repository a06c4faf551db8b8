//! Cleaning pipeline for the hikr.org GPX hike track export.
//!
//! `dataset::ensure_dataset` is the entry point: it finds the input, drops
//! implausible tracks, recomputes elevation data from terrain tiles and
//! writes the cleaned dataset once.

pub mod clean;
pub mod config;
pub mod dataset;
pub mod difficulty;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod progress;
pub mod record;
pub mod style;
pub mod terrain_elevation;
pub mod track;

pub use config::CleanConfig;
pub use dataset::{ensure_dataset, DatasetStatus};
pub use error::CleanError;
