/// Service configuration loader - parses climate.toml
///
/// Settings are layered, later sources winning:
///
/// 1. built-in defaults (SQLite dataset under `Resources/`, port 5000)
/// 2. `climate.toml` in the working directory, or the file given by `--config`
/// 3. `DATABASE_URL` from the environment or `.env`
/// 4. command-line flags (applied by `main`)

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "climate.toml";

/// Location of the published dataset relative to the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///Resources/hawaii.sqlite";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite:///path` or `postgresql://…`
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Threads handling requests. The store itself is shared behind a
    /// lock, so this mainly overlaps socket I/O and JSON encoding.
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            workers: 4,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Read { path: PathBuf, source: io::Error },
    /// Config file is not valid TOML or has wrongly typed values
    Parse { path: PathBuf, source: toml::de::Error },
    /// A value parsed but is out of range
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse {}: {}", path.display(), source)
            }
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses configuration from TOML text. Missing sections and keys fall
/// back to their defaults.
pub fn parse_config(contents: &str, path: &Path) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Loads configuration from `path`, or from `climate.toml` when `path` is
/// `None`. An explicitly requested file must exist; the default file is
/// optional.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    let mut config = match fs::read_to_string(&path) {
        Ok(contents) => parse_config(&contents, &path)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound && !required => ServiceConfig::default(),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    // Load .env file if present
    dotenv::dotenv().ok();
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }

    Ok(config)
}

/// Checks values that deserialize fine but cannot be used.
pub fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.server.workers == 0 {
        return Err(ConfigError::InvalidValue(
            "server.workers must be at least 1".to_string(),
        ));
    }
    Ok(())
}
