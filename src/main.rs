use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hikr_track_cleaner::dataset::load_cleaned;
use hikr_track_cleaner::difficulty::Difficulty;
use hikr_track_cleaner::style::highlight_zero;
use hikr_track_cleaner::{ensure_dataset, CleanConfig, DatasetStatus};

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("hikr_track_cleaner=info"))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;

    let config = CleanConfig::default();

    println!("\n🏔️  HIKR TRACK CLEANER");
    println!("======================");

    let path = match ensure_dataset(&config)? {
        DatasetStatus::Cached(path) => {
            println!("📄 Reusing cleaned dataset: {}", path.display());
            path
        }
        DatasetStatus::Built { path, report } => {
            println!("✅ Cleaned {} of {} tracks", report.output_rows, report.input_rows);
            println!("   • Dropped as implausible: {}", report.dropped_implausible);
            println!("   • Dropped without usable elevation: {}", report.dropped_elevation);
            path
        }
    };

    let records = load_cleaned(&path)
        .with_context(|| format!("reading cleaned dataset {}", path.display()))?;

    let mut per_grade: BTreeMap<Difficulty, usize> = BTreeMap::new();
    for difficulty in records.iter().filter_map(|r| r.difficulty) {
        *per_grade.entry(difficulty).or_default() += 1;
    }

    println!("\n📊 Tracks per difficulty:");
    for (difficulty, count) in &per_grade {
        println!("   {:<45} {}", difficulty.label(), count);
    }

    let uphill: Vec<f64> = records.iter().map(|r| r.uphill.unwrap_or(0.0)).collect();
    let flat = highlight_zero(&uphill).iter().filter(|s| !s.is_empty()).count();
    if flat > 0 {
        println!("\n⚠️  {} tracks report zero uphill, worth a manual look", flat);
    }

    println!("\nDone");
    Ok(())
}
