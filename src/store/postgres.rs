/// PostgreSQL backend for the climate dataset.
///
/// Expects the `station` and `measurement` tables in the connection's
/// current schema. Numeric columns are cast to `float8` and dates to text
/// so the results match the SQLite backend regardless of the declared
/// column types (NUMERIC, REAL, DATE, TEXT, ...).

use chrono::NaiveDate;
use postgres::{Client, NoTls};

use super::{ClimateStore, StoreError};
use crate::model::{format_date, DailyValue, DateRange, Station, StationActivity, TemperatureStats};

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    /// Connects using a `postgresql://` URL.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::connect(url, NoTls)?;
        Ok(PostgresStore { client })
    }
}

impl ClimateStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, StoreError> {
        let rows = self.client.query(
            "SELECT column_name::text
             FROM information_schema.columns
             WHERE table_schema = current_schema()
               AND table_name = $1
             ORDER BY ordinal_position",
            &[&table],
        )?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    fn stations(&mut self) -> Result<Vec<Station>, StoreError> {
        let rows = self.client.query(
            "SELECT station::text, name::text,
                    latitude::float8, longitude::float8, elevation::float8
             FROM station",
            &[],
        )?;

        let stations = rows
            .iter()
            .map(|row| Station {
                station: row.get(0),
                name: row.get(1),
                latitude: row.get(2),
                longitude: row.get(3),
                elevation: row.get(4),
            })
            .collect();
        Ok(stations)
    }

    fn precipitation_since(&mut self, since: NaiveDate) -> Result<Vec<DailyValue>, StoreError> {
        let since = format_date(since);
        let rows = self.client.query(
            "SELECT date::text, prcp::float8
             FROM measurement
             WHERE date::text >= $1",
            &[&since],
        )?;
        Ok(rows.iter().map(daily_value).collect())
    }

    fn temperatures_since(
        &mut self,
        station: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailyValue>, StoreError> {
        let since = format_date(since);
        let rows = self.client.query(
            "SELECT date::text, tobs::float8
             FROM measurement
             WHERE station::text = $1
               AND date::text >= $2",
            &[&station, &since],
        )?;
        Ok(rows.iter().map(daily_value).collect())
    }

    fn most_active_station(&mut self) -> Result<Option<StationActivity>, StoreError> {
        let row = self.client.query_opt(
            "SELECT station::text, COUNT(station) AS observations
             FROM measurement
             WHERE station IS NOT NULL
             GROUP BY station
             ORDER BY observations DESC, station ASC
             LIMIT 1",
            &[],
        )?;

        Ok(row.map(|row| StationActivity {
            station: row.get(0),
            observations: row.get(1),
        }))
    }

    fn temperature_stats(&mut self, range: DateRange) -> Result<TemperatureStats, StoreError> {
        let start = format_date(range.start);
        let end = range.end.map(format_date);
        let row = self.client.query_one(
            "SELECT MIN(tobs)::float8, AVG(tobs)::float8, MAX(tobs)::float8
             FROM measurement
             WHERE date::text >= $1
               AND ($2::text IS NULL OR date::text <= $2::text)",
            &[&start, &end],
        )?;

        Ok(TemperatureStats {
            min: row.get(0),
            avg: row.get(1),
            max: row.get(2),
        })
    }
}

fn daily_value(row: &postgres::Row) -> DailyValue {
    DailyValue {
        date: row.get(0),
        value: row.get(1),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn setup_test_store() -> PostgresStore {
        dotenv::dotenv().ok();
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        PostgresStore::connect(&database_url).expect("Failed to connect to test database")
    }

    #[test]
    #[ignore] // Only run when a PostgreSQL copy of the dataset is available
    fn test_postgres_schema_has_expected_tables() {
        let mut store = setup_test_store();
        for (table, columns) in crate::model::EXPECTED_TABLES {
            let present = store.table_columns(table).expect("column query should succeed");
            for column in *columns {
                assert!(
                    present.iter().any(|c| c.as_str() == *column),
                    "{}.{} should exist",
                    table,
                    column
                );
            }
        }
    }

    #[test]
    #[ignore] // Only run when a PostgreSQL copy of the dataset is available
    fn test_postgres_stats_are_ordered() {
        let mut store = setup_test_store();
        let start = NaiveDate::from_ymd_opt(2016, 8, 23).unwrap();
        let stats = store.temperature_stats(DateRange::from(start)).unwrap();
        if let (Some(min), Some(avg), Some(max)) = (stats.min, stats.avg, stats.max) {
            assert!(min <= avg && avg <= max);
        }
    }
}
