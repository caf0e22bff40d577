/// SQLite backend for the climate dataset.
///
/// The dataset ships as a single SQLite file (`Resources/hawaii.sqlite`).
/// It is opened read-only: a missing file is a startup error rather than a
/// freshly created empty database.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::{ClimateStore, StoreError};
use crate::model::{format_date, DailyValue, DateRange, Station, StationActivity, TemperatureStats};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens an existing database file without write access.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(SqliteStore { conn })
    }

    /// Wraps an already opened connection.
    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore { conn }
    }
}

impl ClimateStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn stations(&mut self) -> Result<Vec<Station>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT station, name, latitude, longitude, elevation FROM station")?;
        let stations = stmt
            .query_map([], |row| {
                Ok(Station {
                    station: row.get(0)?,
                    name: row.get(1)?,
                    latitude: row.get(2)?,
                    longitude: row.get(3)?,
                    elevation: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stations)
    }

    fn precipitation_since(&mut self, since: NaiveDate) -> Result<Vec<DailyValue>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, prcp FROM measurement WHERE date >= ?1")?;
        let values = stmt
            .query_map(params![format_date(since)], daily_value)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    fn temperatures_since(
        &mut self,
        station: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailyValue>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, tobs
             FROM measurement
             WHERE station = ?1
               AND date >= ?2",
        )?;
        let values = stmt
            .query_map(params![station, format_date(since)], daily_value)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    fn most_active_station(&mut self) -> Result<Option<StationActivity>, StoreError> {
        let activity = self
            .conn
            .query_row(
                "SELECT station, COUNT(station) AS observations
                 FROM measurement
                 WHERE station IS NOT NULL
                 GROUP BY station
                 ORDER BY observations DESC, station ASC
                 LIMIT 1",
                [],
                |row| {
                    Ok(StationActivity {
                        station: row.get(0)?,
                        observations: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(activity)
    }

    fn temperature_stats(&mut self, range: DateRange) -> Result<TemperatureStats, StoreError> {
        let stats = self.conn.query_row(
            "SELECT MIN(tobs), AVG(tobs), MAX(tobs)
             FROM measurement
             WHERE date >= ?1
               AND (?2 IS NULL OR date <= ?2)",
            params![format_date(range.start), range.end.map(format_date)],
            |row| {
                Ok(TemperatureStats {
                    min: row.get(0)?,
                    avg: row.get(1)?,
                    max: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }
}

fn daily_value(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyValue> {
    Ok(DailyValue {
        date: row.get(0)?,
        value: row.get(1)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// In-memory store with the dataset's layout, including the `id`
    /// columns the published file carries.
    fn fixture_store() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE station (id INTEGER PRIMARY KEY, station TEXT, name TEXT,
                                   latitude FLOAT, longitude FLOAT, elevation FLOAT);
             CREATE TABLE measurement (id INTEGER PRIMARY KEY, station TEXT, date TEXT,
                                       prcp FLOAT, tobs FLOAT);
             INSERT INTO station (station, name, latitude, longitude, elevation) VALUES
                ('USC00519397', 'WAIKIKI 717.2, HI US', 21.2716, -157.8168, 3.0),
                ('USC00513117', 'KANEOHE 838.1, HI US', 21.4234, -157.8015, 14.6);
             INSERT INTO measurement (station, date, prcp, tobs) VALUES
                ('USC00519397', '2016-08-22', 0.4, 70),
                ('USC00519397', '2016-08-23', 0.0, 81),
                ('USC00519397', '2016-08-24', NULL, 79),
                ('USC00513117', '2016-08-23', 0.15, 76),
                ('USC00513117', '2017-08-23', 0.0, 82);",
        )
        .unwrap();
        SqliteStore::from_connection(conn)
    }

    #[test]
    fn test_table_columns_lists_existing_columns() {
        let mut store = fixture_store();
        let columns = store.table_columns("measurement").unwrap();
        assert_eq!(columns, vec!["id", "station", "date", "prcp", "tobs"]);
    }

    #[test]
    fn test_table_columns_empty_for_missing_table() {
        let mut store = fixture_store();
        assert!(store.table_columns("nonexistent").unwrap().is_empty());
    }

    #[test]
    fn test_stations_in_storage_order() {
        let mut store = fixture_store();
        let stations = store.stations().unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].station, "USC00519397");
        assert_eq!(stations[1].name, "KANEOHE 838.1, HI US");
        assert_eq!(stations[1].elevation, Some(14.6));
    }

    #[test]
    fn test_precipitation_since_is_inclusive() {
        let mut store = fixture_store();
        let rows = store.precipitation_since(date("2016-08-23")).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.date.as_str() >= "2016-08-23"));
        assert_eq!(rows[1], DailyValue { date: "2016-08-24".to_string(), value: None });
    }

    #[test]
    fn test_temperatures_since_filters_station() {
        let mut store = fixture_store();
        let rows = store.temperatures_since("USC00513117", date("2016-01-01")).unwrap();
        assert_eq!(
            rows,
            vec![
                DailyValue { date: "2016-08-23".to_string(), value: Some(76.0) },
                DailyValue { date: "2017-08-23".to_string(), value: Some(82.0) },
            ]
        );
    }

    #[test]
    fn test_projections_tolerate_nulls_in_other_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE measurement (station TEXT, date TEXT, prcp FLOAT, tobs FLOAT);
             INSERT INTO measurement VALUES
                ('USC1', '2016-09-01', 0.5, 70),
                ('USC1', '2016-09-02', 0.2, NULL),
                (NULL, '2016-09-03', 0.1, 71),
                ('USC1', '2016-09-04', NULL, 72);",
        )
        .unwrap();
        let mut store = SqliteStore::from_connection(conn);

        let prcp = store.precipitation_since(date("2016-08-23")).unwrap();
        assert_eq!(prcp.len(), 4);
        assert_eq!(prcp[1].value, Some(0.2));

        let tobs = store.temperatures_since("USC1", date("2016-08-23")).unwrap();
        assert_eq!(tobs.len(), 3);
        assert_eq!(tobs[1].value, None);

        assert_eq!(store.most_active_station().unwrap().unwrap().station, "USC1");
    }

    #[test]
    fn test_most_active_station_by_row_count() {
        let mut store = fixture_store();
        let activity = store.most_active_station().unwrap().unwrap();
        assert_eq!(activity.station, "USC00519397");
        assert_eq!(activity.observations, 3);
    }

    #[test]
    fn test_most_active_station_tie_goes_to_lowest_id() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE measurement (station TEXT, date TEXT, prcp FLOAT, tobs FLOAT);
             INSERT INTO measurement VALUES
                ('USC2', '2017-01-01', 0.0, 60),
                ('USC1', '2017-01-01', 0.0, 61);",
        )
        .unwrap();
        let mut store = SqliteStore::from_connection(conn);
        assert_eq!(store.most_active_station().unwrap().unwrap().station, "USC1");
    }

    #[test]
    fn test_most_active_station_none_when_empty() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE measurement (station TEXT, date TEXT, prcp FLOAT, tobs FLOAT);")
            .unwrap();
        let mut store = SqliteStore::from_connection(conn);
        assert!(store.most_active_station().unwrap().is_none());
    }

    #[test]
    fn test_temperature_stats_open_and_closed_ranges() {
        let mut store = fixture_store();

        let open = store.temperature_stats(DateRange::from(date("2016-08-23"))).unwrap();
        assert_eq!(open.min, Some(76.0));
        assert_eq!(open.max, Some(82.0));
        assert_eq!(open.avg, Some((81.0 + 79.0 + 76.0 + 82.0) / 4.0));

        let closed = store
            .temperature_stats(DateRange::between(date("2016-08-22"), date("2016-08-23")))
            .unwrap();
        assert_eq!(closed.min, Some(70.0));
        assert_eq!(closed.max, Some(81.0));
    }

    #[test]
    fn test_temperature_stats_null_when_nothing_matches() {
        let mut store = fixture_store();
        let stats = store
            .temperature_stats(DateRange::between(date("2017-01-02"), date("2017-01-01")))
            .unwrap();
        assert_eq!(stats, TemperatureStats::default());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SqliteStore::open(&dir.path().join("absent.sqlite")).is_err());
    }
}
