/// One row of the hikr export.
///
/// Field decoding is lenient: numbers and timestamps that do not parse become
/// `None` instead of failing the whole load, and unknown difficulty labels
/// are dropped.
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::difficulty::Difficulty;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_difficulty")]
    pub difficulty: Option<Difficulty>,
    #[serde(
        default,
        serialize_with = "write_timestamp",
        deserialize_with = "lenient_timestamp"
    )]
    pub start_time: Option<NaiveDateTime>,
    #[serde(
        default,
        serialize_with = "write_timestamp",
        deserialize_with = "lenient_timestamp"
    )]
    pub end_time: Option<NaiveDateTime>,
    /// Seconds in motion
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub moving_time: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub length_2d: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub length_3d: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub max_speed: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub min_elevation: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub max_elevation: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub uphill: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub downhill: Option<f64>,
    #[serde(default)]
    pub bounds: Option<String>,
    pub gpx: String,
}

impl TrackRecord {
    /// Replaces a zero or missing `moving_time` with `end_time - start_time`
    /// when both timestamps are known.
    pub fn backfill_moving_time(&mut self) {
        let needs_backfill = match self.moving_time {
            None => true,
            Some(seconds) => seconds == 0.0,
        };
        if !needs_backfill {
            return;
        }

        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            let elapsed = end.signed_duration_since(start);
            self.moving_time = Some(elapsed.num_milliseconds() as f64 / 1000.0);
        }
    }

    /// Average speed in km/h, `None` when either operand is missing or the
    /// moving time is not positive.
    pub fn average_speed_kmh(&self) -> Option<f64> {
        let seconds = self.moving_time.filter(|s| *s > 0.0)?;
        let metres = self.length_2d?;
        Some((metres / 1000.0) / (seconds / 3600.0))
    }
}

/// Parses the timestamp shapes found in the export; anything else is `None`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn write_timestamp<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.collect_str(&ts.format(TIMESTAMP_FORMAT)),
        None => serializer.serialize_none(),
    }
}

fn lenient_difficulty<'de, D>(deserializer: D) -> Result<Option<Difficulty>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|label| label.parse().ok()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub(crate) fn sample_record(id: &str) -> TrackRecord {
        TrackRecord {
            id: id.to_string(),
            name: Some(format!("Hike {}", id)),
            user: Some("tester".to_string()),
            url: None,
            difficulty: Some(Difficulty::T2),
            start_time: None,
            end_time: None,
            moving_time: Some(3600.0),
            length_2d: Some(5000.0),
            length_3d: Some(5100.0),
            max_speed: Some(1.5),
            min_elevation: None,
            max_elevation: None,
            uphill: None,
            downhill: None,
            bounds: None,
            gpx: String::new(),
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 7, 3)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(parse_timestamp("2016-07-03 08:30:00"), Some(at(8, 30, 0)));
        assert_eq!(parse_timestamp("2016-07-03T08:30:00"), Some(at(8, 30, 0)));
        assert_eq!(parse_timestamp("2016-07-03T10:30:00+02:00"), Some(at(8, 30, 0)));
        assert_eq!(parse_timestamp("2016-07-03 10:30:00+02:00"), Some(at(8, 30, 0)));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_backfill_zero_moving_time() {
        let mut record = sample_record("a");
        record.moving_time = Some(0.0);
        record.start_time = Some(at(8, 0, 0));
        record.end_time = Some(at(10, 30, 0));
        record.backfill_moving_time();
        assert_eq!(record.moving_time, Some(9000.0));
    }

    #[test]
    fn test_backfill_missing_moving_time() {
        let mut record = sample_record("a");
        record.moving_time = None;
        record.start_time = Some(at(8, 0, 0));
        record.end_time = Some(at(8, 20, 0));
        record.backfill_moving_time();
        assert_eq!(record.moving_time, Some(1200.0));
    }

    #[test]
    fn test_backfill_keeps_value_without_timestamps() {
        let mut record = sample_record("a");
        record.moving_time = Some(0.0);
        record.start_time = Some(at(8, 0, 0));
        record.backfill_moving_time();
        assert_eq!(record.moving_time, Some(0.0));

        let mut record = sample_record("b");
        record.moving_time = Some(1800.0);
        record.start_time = Some(at(8, 0, 0));
        record.end_time = Some(at(12, 0, 0));
        record.backfill_moving_time();
        assert_eq!(record.moving_time, Some(1800.0));
    }

    #[test]
    fn test_average_speed() {
        let record = sample_record("a");
        assert_eq!(record.average_speed_kmh(), Some(5.0));

        let mut stopped = sample_record("b");
        stopped.moving_time = Some(0.0);
        assert_eq!(stopped.average_speed_kmh(), None);
    }

    #[test]
    fn test_lenient_csv_decoding() {
        let data = "\
_id,name,user,url,difficulty,start_time,end_time,moving_time,length_2d,length_3d,max_speed,min_elevation,max_elevation,uphill,downhill,bounds,gpx,extra
x1,Rigi,anna,,T3+ - Difficult Mountain hike,2016-07-03 08:30:00,garbage,3600,abc,,,,,,,,<gpx/>,ignored
x2,,,,T9 - Moon walk,,,,1500.5,,,,,,,,<gpx/>,ignored
";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let records: Vec<TrackRecord> = reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].difficulty, Some(Difficulty::T3Plus));
        assert_eq!(records[0].start_time, Some(at(8, 30, 0)));
        assert_eq!(records[0].end_time, None);
        assert_eq!(records[0].moving_time, Some(3600.0));
        assert_eq!(records[0].length_2d, None);
        assert_eq!(records[0].url, None);

        assert_eq!(records[1].difficulty, None);
        assert_eq!(records[1].name, None);
        assert_eq!(records[1].length_2d, Some(1500.5));
    }
}
