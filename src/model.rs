/// Shared data types for the climate observation service.
///
/// The two tables of the dataset are declared here as plain record types.
/// Their expected column layout is also declared here so the startup check
/// in `db` can verify the store against it before any route is served.

use chrono::NaiveDate;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Table layout
// ---------------------------------------------------------------------------

/// Table holding one row per weather station.
pub const STATION_TABLE: &str = "station";

/// Table holding one row per observation.
pub const MEASUREMENT_TABLE: &str = "measurement";

/// Columns the `station` table must carry.
pub const STATION_COLUMNS: &[&str] = &["station", "name", "latitude", "longitude", "elevation"];

/// Columns the `measurement` table must carry.
pub const MEASUREMENT_COLUMNS: &[&str] = &["station", "date", "prcp", "tobs"];

/// Every table the service reads, paired with its required columns.
pub const EXPECTED_TABLES: &[(&str, &[&str])] = &[
    (STATION_TABLE, STATION_COLUMNS),
    (MEASUREMENT_TABLE, MEASUREMENT_COLUMNS),
];

/// Date format used in storage, in path parameters and in JSON keys.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Most recent observation date in the published dataset.
///
/// The "last twelve months" routes count back from this date rather than
/// from today, so their output is reproducible for a given snapshot.
pub const LATEST_OBSERVATION: NaiveDate = match NaiveDate::from_ymd_opt(2017, 8, 23) {
    Some(date) => date,
    None => panic!("invalid LATEST_OBSERVATION"),
};

/// Lower bound (inclusive) for the precipitation and tobs routes:
/// 365 days before [`LATEST_OBSERVATION`].
pub const ONE_YEAR_CUTOFF: NaiveDate = match NaiveDate::from_ymd_opt(2016, 8, 23) {
    Some(date) => date,
    None => panic!("invalid ONE_YEAR_CUTOFF"),
};

/// Renders a date the way the dataset stores it (`YYYY-MM-DD`).
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One row of the `station` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Station identifier, e.g. `USC00519397`.
    pub station: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
}

/// One `measurement` column for one date, e.g. `(date, prcp)`. Routes
/// select only the column they return, so NULLs elsewhere in the row
/// never reach them.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyValue {
    /// Observation date as stored, `YYYY-MM-DD`.
    pub date: String,
    /// `None` where the column is NULL, e.g. days the gauge was not read.
    pub value: Option<f64>,
}

/// A station paired with its number of measurement rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationActivity {
    pub station: String,
    pub observations: i64,
}

/// Inclusive date window for temperature statistics. An open `end`
/// means "through the last observation".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn from(start: NaiveDate) -> Self {
        DateRange { start, end: None }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end: Some(end) }
    }
}

/// Minimum, average and maximum observed temperature over a date range.
/// All three are `None` when no rows fall inside the range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TemperatureStats {
    pub min: Option<f64>,
    pub avg: Option<f64>,
    pub max: Option<f64>,
}

/// Serialized as `[min, avg, max]`, the shape API clients consume.
impl Serialize for TemperatureStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.min)?;
        seq.serialize_element(&self.avg)?;
        seq.serialize_element(&self.max)?;
        seq.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
