/// Query session over the climate dataset.
///
/// `ClimateStore` is the only interface route handlers use to read data.
/// One store is opened at startup and shared by every request; backends:
///
/// - `sqlite`   — the published dataset file, opened read-only
/// - `postgres` — the same two tables loaded into PostgreSQL
///
/// Dates are compared as ISO `YYYY-MM-DD` text on both backends, which is
/// how the dataset stores them and sorts the same as calendar order.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::model::{DailyValue, DateRange, Station, StationActivity, TemperatureStats};

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

/// Store handle shared between server workers. Queries are serialized
/// through the mutex; neither backend's connection may be used from two
/// threads at once.
pub type SharedStore = Arc<Mutex<Box<dyn ClimateStore>>>;

/// Wraps an opened store for use by the HTTP server.
pub fn share(store: Box<dyn ClimateStore>) -> SharedStore {
    Arc::new(Mutex::new(store))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Query failure from either backend.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Postgres(::postgres::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite query failed: {}", e),
            StoreError::Postgres(e) => write!(f, "PostgreSQL query failed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Sqlite(e) => Some(e),
            StoreError::Postgres(e) => Some(e),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<::postgres::Error> for StoreError {
    fn from(e: ::postgres::Error) -> Self {
        StoreError::Postgres(e)
    }
}

// ---------------------------------------------------------------------------
// Store interface
// ---------------------------------------------------------------------------

/// Read-only queries the API needs. Every method issues exactly one query.
pub trait ClimateStore: Send {
    /// Short backend name for log output.
    fn backend(&self) -> &'static str;

    /// Column names of `table`. Empty when the table does not exist.
    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, StoreError>;

    /// Every station, in storage order.
    fn stations(&mut self) -> Result<Vec<Station>, StoreError>;

    /// `(date, prcp)` for every measurement dated on or after `since`, in
    /// storage order.
    fn precipitation_since(&mut self, since: NaiveDate) -> Result<Vec<DailyValue>, StoreError>;

    /// `(date, tobs)` for one station's measurements dated on or after
    /// `since`, in storage order.
    fn temperatures_since(
        &mut self,
        station: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailyValue>, StoreError>;

    /// The station with the most measurement rows. Ties go to the lowest
    /// station identifier so repeated calls agree. `None` when there are
    /// no measurements.
    fn most_active_station(&mut self) -> Result<Option<StationActivity>, StoreError>;

    /// Min/avg/max of `tobs` over the inclusive date range.
    fn temperature_stats(&mut self, range: DateRange) -> Result<TemperatureStats, StoreError>;
}
