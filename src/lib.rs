/// climate_service: read-only HTTP API over the Hawaii climate dataset.
///
/// # Module structure
///
/// ```text
/// climate_service
/// ├── model     — record types (Station, DailyValue, TemperatureStats, …) and table layout
/// ├── config    — service configuration loader (climate.toml, DATABASE_URL)
/// ├── db        — store connection and startup schema validation
/// ├── store     — ClimateStore query session
/// │   ├── sqlite   — the dataset file, opened read-only
/// │   └── postgres — the same tables loaded into PostgreSQL
/// └── endpoint  — routes, handlers and the tiny_http server
/// ```

/// Public modules
pub mod config;
pub mod db;
pub mod endpoint;
pub mod model;
pub mod store;
