/// Row removal over the in-memory dataset.
use tracing::info;

use crate::config::FilterThresholds;
use crate::record::TrackRecord;

/// Removes every row matching `predicate`, keeping the relative order of the
/// rest. Returns how many rows were removed.
pub fn drop_where<T, F>(rows: &mut Vec<T>, mut predicate: F) -> usize
where
    F: FnMut(&T) -> bool,
{
    let before = rows.len();
    rows.retain(|row| !predicate(row));
    before - rows.len()
}

/// Checks run before enrichment to discard implausible tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    /// `moving_time` missing or not positive
    NoMovingTime,
    /// Average speed above the threshold
    TooFast,
    /// `length_2d` missing or below the threshold
    TooShort,
}

impl RecordFilter {
    /// Order in which the first pass applies the filters.
    pub const FIRST_PASS: [RecordFilter; 3] = [
        RecordFilter::NoMovingTime,
        RecordFilter::TooFast,
        RecordFilter::TooShort,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RecordFilter::NoMovingTime => "no positive moving time",
            RecordFilter::TooFast => "average speed too high",
            RecordFilter::TooShort => "track too short",
        }
    }

    pub fn rejects(self, record: &TrackRecord, thresholds: &FilterThresholds) -> bool {
        match self {
            RecordFilter::NoMovingTime => !matches!(record.moving_time, Some(s) if s > 0.0),
            RecordFilter::TooFast => record
                .average_speed_kmh()
                .is_some_and(|speed| speed > thresholds.max_speed_kmh),
            RecordFilter::TooShort => {
                !matches!(record.length_2d, Some(metres) if metres >= thresholds.min_length_m)
            }
        }
    }

    pub fn apply(self, records: &mut Vec<TrackRecord>, thresholds: &FilterThresholds) -> usize {
        let dropped = drop_where(records, |record| self.rejects(record, thresholds));
        info!(filter = self.name(), dropped, remaining = records.len(), "filter applied");
        dropped
    }
}

/// Backfills moving times, then applies the first-pass filters in order.
pub fn first_pass(records: &mut Vec<TrackRecord>, thresholds: &FilterThresholds) -> usize {
    for record in records.iter_mut() {
        record.backfill_moving_time();
    }
    RecordFilter::FIRST_PASS
        .iter()
        .map(|filter| filter.apply(records, thresholds))
        .sum()
}
