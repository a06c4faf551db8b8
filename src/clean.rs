/// The cleaning routine: filter, recompute elevations, filter again.
use tracing::{debug, info, warn};

use crate::config::{CleanConfig, RetryPolicy};
use crate::enrich::{enrich, EnrichOutcome};
use crate::filter::{drop_where, first_pass};
use crate::progress::ProgressLine;
use crate::record::TrackRecord;
use crate::terrain_elevation::ElevationProvider;
use crate::track;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub input_rows: usize,
    pub dropped_implausible: usize,
    pub recomputed: usize,
    pub dropped_elevation: usize,
    pub output_rows: usize,
}

/// Recomputes elevation data for one record and reports whether the record
/// is still valid.
///
/// A record whose route could be completed gets fresh statistics and its
/// `gpx` replaced by the updated track. A record whose route stays
/// incomplete is left untouched and stays valid only if its original track
/// already had elevation on every point. Parse and provider failures make it
/// invalid.
pub fn recompute_record<P: ElevationProvider>(
    record: &mut TrackRecord,
    provider: &mut P,
    policy: &RetryPolicy,
) -> bool {
    let mut route = match track::parse(&record.gpx) {
        Ok(route) => route,
        Err(e) => {
            debug!(id = %record.id, error = %e, "unparseable track");
            return false;
        }
    };

    match enrich(&mut route, provider, policy) {
        Ok(EnrichOutcome::Recomputed(stats)) => match track::serialize(&route) {
            Ok(gpx) => {
                record.min_elevation = Some(stats.min_elevation);
                record.max_elevation = Some(stats.max_elevation);
                record.uphill = Some(stats.uphill);
                record.downhill = Some(stats.downhill);
                record.gpx = gpx;
                true
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "could not write updated track");
                false
            }
        },
        Ok(EnrichOutcome::Incomplete { initially_complete }) => initially_complete,
        Err(e) => {
            warn!(id = %record.id, error = %e, "elevation lookup failed");
            false
        }
    }
}

pub fn clean_data<P: ElevationProvider>(
    mut records: Vec<TrackRecord>,
    provider: &mut P,
    config: &CleanConfig,
) -> (Vec<TrackRecord>, CleanReport) {
    let mut report = CleanReport {
        input_rows: records.len(),
        ..Default::default()
    };

    report.dropped_implausible = first_pass(&mut records, &config.thresholds);

    let total = records.len();
    info!(records = total, "recomputing elevation");
    let mut progress = ProgressLine::stdout("Recomputing elevation", total);
    let mut checked: Vec<(TrackRecord, bool)> = Vec::with_capacity(total);
    for (i, mut record) in records.into_iter().enumerate() {
        progress.update(i + 1);
        let valid = recompute_record(&mut record, provider, &config.retry);
        checked.push((record, valid));
    }
    progress.finish();

    report.recomputed = checked.iter().filter(|(_, valid)| *valid).count();
    report.dropped_elevation = drop_where(&mut checked, |(_, valid)| !valid);
    info!(
        dropped = report.dropped_elevation,
        remaining = checked.len(),
        "dropped records without usable elevation"
    );

    let cleaned: Vec<TrackRecord> = checked.into_iter().map(|(record, _)| record).collect();
    let ungraded = cleaned.iter().filter(|r| r.difficulty.is_none()).count();
    if ungraded > 0 {
        info!(ungraded, "records without a known difficulty grade");
    }

    report.output_rows = cleaned.len();
    (cleaned, report)
}
