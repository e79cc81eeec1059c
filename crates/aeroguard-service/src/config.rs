//! Server configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use aeroguard_core::{
    Estimator, ForecastEngine, IngestConfig, OpenWeatherSource, ReadingSource, Scale,
    SharedStore, Thresholds, WaqiSource, shared_store,
};
use aeroguard_store::{CsvStore, MemoryStore, SqliteStore};
use aeroguard_types::{DEFAULT_HORIZON_HOURS, Location};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// History storage settings.
    pub storage: StorageConfig,
    /// Collection cadence and limits.
    pub collector: CollectorConfig,
    /// Forecast settings.
    pub forecast: ForecastConfig,
    /// Upstream provider settings.
    pub source: SourceConfig,
    /// Locations to monitor.
    pub locations: Vec<Location>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            collector: CollectorConfig::default(),
            forecast: ForecastConfig::default(),
            source: SourceConfig::default(),
            locations: default_locations(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// # Example
    ///
    /// ```
    /// use aeroguard_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.collector.validate());
        errors.extend(self.forecast.validate());
        errors.extend(self.source.validate());

        if self.locations.is_empty() {
            errors.push(ValidationError {
                field: "locations".to_string(),
                message: "at least one location is required".to_string(),
            });
        }

        let mut seen_names = HashSet::new();
        for (i, location) in self.locations.iter().enumerate() {
            let prefix = format!("locations[{}]", i);
            errors.extend(validate_location(location, &prefix));

            if !location.name.is_empty() && !seen_names.insert(location.name.to_lowercase()) {
                errors.push(ValidationError {
                    field: format!("{}.name", prefix),
                    message: format!("duplicate location name '{}'", location.name),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Ingestion settings derived from the collector section.
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            fetch_timeout: Duration::from_secs(self.collector.fetch_timeout),
            refresh_interval: Duration::from_secs(self.collector.refresh_interval),
            max_concurrency: self.collector.max_concurrency,
        }
    }

    /// Forecast engine for the configured estimator and horizon.
    pub fn forecast_engine(&self) -> ForecastEngine {
        ForecastEngine::new(self.forecast.estimator, self.forecast.horizon_hours)
    }

    /// Categorizer for the configured scale.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::for_scale(self.source.scale)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
    /// Snapshot broadcast buffer for WebSocket subscribers.
    pub broadcast_buffer: usize,
}

/// Default snapshot broadcast buffer.
pub const DEFAULT_BROADCAST_BUFFER: usize = 16;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            broadcast_buffer: DEFAULT_BROADCAST_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
        } else {
            let parts: Vec<&str> = self.bind.rsplitn(2, ':').collect();
            if parts.len() != 2 {
                errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                });
            } else {
                let port_str = parts[0];
                match port_str.parse::<u16>() {
                    Ok(0) => {
                        errors.push(ValidationError {
                            field: "server.bind".to_string(),
                            message: "port cannot be 0".to_string(),
                        });
                    }
                    Err(_) => {
                        errors.push(ValidationError {
                            field: "server.bind".to_string(),
                            message: format!(
                                "invalid port '{}': must be a number 1-65535",
                                port_str
                            ),
                        });
                    }
                    Ok(_) => {}
                }
            }
        }

        if self.broadcast_buffer == 0 {
            errors.push(ValidationError {
                field: "server.broadcast_buffer".to_string(),
                message: "broadcast buffer must be at least 1".to_string(),
            });
        }

        errors
    }
}

/// History backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Flat `timestamp,location,aqi` file.
    #[default]
    Csv,
    /// Embedded SQLite database.
    Sqlite,
    /// In-process only; history is lost on restart.
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// History backend.
    pub backend: StorageBackend,
    /// History file path. Defaults to the backend's file in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Retention window in hours.
    pub retention_hours: u32,
}

/// Minimum retention window in hours.
pub const MIN_RETENTION_HOURS: u32 = 1;
/// Maximum retention window in hours (one week).
pub const MAX_RETENTION_HOURS: u32 = 168;

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            retention_hours: aeroguard_store::DEFAULT_RETENTION_HOURS,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.backend != StorageBackend::Memory
            && let Some(path) = &self.path
            && path.as_os_str().is_empty()
        {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "history path cannot be empty".to_string(),
            });
        }

        if !(MIN_RETENTION_HOURS..=MAX_RETENTION_HOURS).contains(&self.retention_hours) {
            errors.push(ValidationError {
                field: "storage.retention_hours".to_string(),
                message: format!(
                    "retention {} is out of range ({}-{} hours)",
                    self.retention_hours, MIN_RETENTION_HOURS, MAX_RETENTION_HOURS
                ),
            });
        }

        errors
    }

    /// The history file path for the configured backend.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        match self.backend {
            StorageBackend::Memory => None,
            StorageBackend::Csv => Some(
                self.path
                    .clone()
                    .unwrap_or_else(aeroguard_store::default_csv_path),
            ),
            StorageBackend::Sqlite => Some(
                self.path
                    .clone()
                    .unwrap_or_else(aeroguard_store::default_db_path),
            ),
        }
    }

    /// The retention window.
    pub fn retention(&self) -> time::Duration {
        time::Duration::hours(i64::from(self.retention_hours))
    }

    /// Open the configured history store.
    ///
    /// Unreadable history is discarded by the store itself; only I/O and
    /// database failures that prevent a usable store are returned.
    pub fn open(&self) -> Result<SharedStore, aeroguard_store::Error> {
        let retention = self.retention();
        Ok(match (self.backend, self.resolved_path()) {
            (StorageBackend::Csv, Some(path)) => shared_store(CsvStore::open(path, retention)?),
            (StorageBackend::Sqlite, Some(path)) => {
                shared_store(SqliteStore::open(path, retention)?)
            }
            _ => shared_store(MemoryStore::new(retention)),
        })
    }
}

/// Collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Seconds between ingestion cycles, also the cache freshness window.
    pub refresh_interval: u64,
    /// Per-fetch timeout in seconds.
    pub fetch_timeout: u64,
    /// Upper bound on in-flight fetches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

/// Minimum refresh interval in seconds.
pub const MIN_REFRESH_INTERVAL: u64 = 60;
/// Maximum refresh interval in seconds (one day).
pub const MAX_REFRESH_INTERVAL: u64 = 86_400;

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: 600,
            fetch_timeout: 10,
            max_concurrency: None,
        }
    }
}

impl CollectorConfig {
    /// Validate collector configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.refresh_interval < MIN_REFRESH_INTERVAL {
            errors.push(ValidationError {
                field: "collector.refresh_interval".to_string(),
                message: format!(
                    "refresh interval {} is too short (minimum {} seconds)",
                    self.refresh_interval, MIN_REFRESH_INTERVAL
                ),
            });
        } else if self.refresh_interval > MAX_REFRESH_INTERVAL {
            errors.push(ValidationError {
                field: "collector.refresh_interval".to_string(),
                message: format!(
                    "refresh interval {} is too long (maximum {} seconds / 1 day)",
                    self.refresh_interval, MAX_REFRESH_INTERVAL
                ),
            });
        }

        if self.fetch_timeout == 0 {
            errors.push(ValidationError {
                field: "collector.fetch_timeout".to_string(),
                message: "fetch timeout must be at least 1 second".to_string(),
            });
        } else if self.fetch_timeout >= self.refresh_interval {
            errors.push(ValidationError {
                field: "collector.fetch_timeout".to_string(),
                message: format!(
                    "fetch timeout {} must be shorter than the refresh interval ({} seconds)",
                    self.fetch_timeout, self.refresh_interval
                ),
            });
        }

        if self.max_concurrency == Some(0) {
            errors.push(ValidationError {
                field: "collector.max_concurrency".to_string(),
                message: "max concurrency must be at least 1".to_string(),
            });
        }

        errors
    }
}

/// Forecast configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Estimator to apply.
    pub estimator: Estimator,
    /// Forecast horizon in hours.
    pub horizon_hours: u32,
}

/// Maximum forecast horizon in hours.
pub const MAX_HORIZON_HOURS: u32 = 48;

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            estimator: Estimator::default(),
            horizon_hours: DEFAULT_HORIZON_HOURS,
        }
    }
}

impl ForecastConfig {
    /// Validate forecast configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(1..=MAX_HORIZON_HOURS).contains(&self.horizon_hours) {
            errors.push(ValidationError {
                field: "forecast.horizon_hours".to_string(),
                message: format!(
                    "horizon {} is out of range (1-{} hours)",
                    self.horizon_hours, MAX_HORIZON_HOURS
                ),
            });
        }

        errors
    }
}

/// Upstream AQI provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// World Air Quality Index geo feed.
    #[default]
    Waqi,
    /// OpenWeather air pollution API (PM2.5).
    OpenWeather,
}

/// Public token accepted by the WAQI API for evaluation.
pub const WAQI_DEMO_TOKEN: &str = "demo";

/// Source configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Provider to query.
    pub provider: Provider,
    /// API token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Override for the provider base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Categorizer scale.
    pub scale: Scale,
}

impl SourceConfig {
    /// Validate source configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        match self.token.as_deref() {
            Some("") => errors.push(ValidationError {
                field: "source.token".to_string(),
                message: "token cannot be empty string (omit it instead)".to_string(),
            }),
            None if self.provider == Provider::OpenWeather => errors.push(ValidationError {
                field: "source.token".to_string(),
                message: "an API key is required for the openweather provider".to_string(),
            }),
            _ => {}
        }

        if let Some(url) = &self.base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "source.base_url".to_string(),
                message: format!("base URL '{}' must start with http:// or https://", url),
            });
        }

        errors
    }

    /// Build the configured reading source.
    pub fn build(&self) -> Result<Arc<dyn ReadingSource>, aeroguard_core::Error> {
        Ok(match self.provider {
            Provider::Waqi => {
                let token = self.token.clone().unwrap_or_else(|| {
                    warn!("No WAQI token configured, using the demo token");
                    WAQI_DEMO_TOKEN.to_string()
                });
                let mut source = WaqiSource::new(token)?;
                if let Some(url) = &self.base_url {
                    source = source.with_base_url(url);
                }
                Arc::new(source)
            }
            Provider::OpenWeather => {
                let mut source = OpenWeatherSource::new(self.token.clone().unwrap_or_default())?;
                if let Some(url) = &self.base_url {
                    source = source.with_base_url(url);
                }
                Arc::new(source)
            }
        })
    }
}

fn validate_location(location: &Location, prefix: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if location.name.trim().is_empty() {
        errors.push(ValidationError {
            field: format!("{}.name", prefix),
            message: "location name cannot be empty".to_string(),
        });
    }

    if !(-90.0..=90.0).contains(&location.latitude) {
        errors.push(ValidationError {
            field: format!("{}.latitude", prefix),
            message: format!("latitude {} is out of range (-90 to 90)", location.latitude),
        });
    }

    if !(-180.0..=180.0).contains(&location.longitude) {
        errors.push(ValidationError {
            field: format!("{}.longitude", prefix),
            message: format!(
                "longitude {} is out of range (-180 to 180)",
                location.longitude
            ),
        });
    }

    errors
}

/// The built-in location table: fifteen neighbourhoods across Mumbai.
pub fn default_locations() -> Vec<Location> {
    [
        ("Colaba", 18.91, 72.82),
        ("Marine Lines", 18.94, 72.82),
        ("Byculla", 18.98, 72.83),
        ("Dadar", 19.02, 72.84),
        ("Parel", 19.00, 72.83),
        ("Kurla", 19.07, 72.88),
        ("Ghatkopar", 19.08, 72.91),
        ("Mulund", 19.17, 72.95),
        ("Bandra", 19.06, 72.83),
        ("Andheri", 19.12, 72.85),
        ("Goregaon", 19.15, 72.85),
        ("Malad", 19.18, 72.84),
        ("Borivali", 19.23, 72.86),
        ("Vashi", 19.07, 72.99),
        ("Nerul", 19.03, 73.02),
    ]
    .into_iter()
    .map(|(name, lat, lon)| Location::new(name, lat, lon))
    .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `locations[0].name`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aeroguard")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_errors(config: &Config) -> Vec<ValidationError> {
        match config.validate() {
            Err(ConfigError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.broadcast_buffer, 16);
        assert_eq!(config.storage.backend, StorageBackend::Csv);
        assert_eq!(config.storage.retention_hours, 12);
        assert_eq!(config.collector.refresh_interval, 600);
        assert_eq!(config.forecast.horizon_hours, 6);
        assert_eq!(config.forecast.estimator, Estimator::TrendDelta);
        assert_eq!(config.locations.len(), 15);
        assert_eq!(config.locations[0].name, "Colaba");
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_resolved_path_per_backend() {
        let mut storage = StorageConfig::default();
        assert_eq!(
            storage.resolved_path(),
            Some(aeroguard_store::default_csv_path())
        );

        storage.backend = StorageBackend::Sqlite;
        assert_eq!(
            storage.resolved_path(),
            Some(aeroguard_store::default_db_path())
        );

        storage.path = Some(PathBuf::from("/data/aqi.db"));
        assert_eq!(storage.resolved_path(), Some(PathBuf::from("/data/aqi.db")));

        storage.backend = StorageBackend::Memory;
        assert_eq!(storage.resolved_path(), None);
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [server]
            bind = "0.0.0.0:9000"

            [storage]
            backend = "sqlite"
            path = "/data/aeroguard.db"
            retention_hours = 24

            [collector]
            refresh_interval = 300
            fetch_timeout = 5
            max_concurrency = 4

            [forecast]
            estimator = "regression"
            horizon_hours = 3

            [source]
            provider = "openweather"
            token = "abc123"
            scale = "pm25"

            [[locations]]
            name = "Colaba"
            latitude = 18.91
            longitude = 72.82
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.broadcast_buffer, 16);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.path, Some(PathBuf::from("/data/aeroguard.db")));
        assert_eq!(config.collector.max_concurrency, Some(4));
        assert_eq!(config.forecast.estimator, Estimator::Regression);
        assert_eq!(config.source.provider, Provider::OpenWeather);
        assert_eq!(config.source.scale, Scale::Pm25);
        assert_eq!(config.locations.len(), 1);
        assert!(config.validate().is_ok());

        let ingest = config.ingest_config();
        assert_eq!(ingest.fetch_timeout, Duration::from_secs(5));
        assert_eq!(ingest.refresh_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_keeps_default_locations() {
        let config: Config = toml::from_str("[collector]\nrefresh_interval = 900\n").unwrap();
        assert_eq!(config.collector.refresh_interval, 900);
        assert_eq!(config.collector.fetch_timeout, 10);
        assert_eq!(config.locations.len(), 15);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("server.toml");

        let mut config = Config::default();
        config.server.bind = "0.0.0.0:9090".to_string();
        config.storage.backend = StorageBackend::Memory;
        config.source.token = Some("secret".to_string());
        config.locations = vec![Location::new("Vashi", 19.07, 72.99)];

        config.save(&config_path).unwrap();
        let loaded = Config::load_validated(&config_path).unwrap();

        assert_eq!(loaded.server.bind, "0.0.0.0:9090");
        assert_eq!(loaded.storage.backend, StorageBackend::Memory);
        assert_eq!(loaded.source.token.as_deref(), Some("secret"));
        assert_eq!(loaded.locations, config.locations);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unknown_estimator_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[forecast]\nestimator = \"arima\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("aeroguard/server.toml"));
    }

    #[test]
    fn test_server_bind_validation() {
        let valid = ServerConfig::default();
        assert!(valid.validate().is_empty());

        let valid_ipv6 = ServerConfig {
            bind: "[::1]:8080".to_string(),
            ..ServerConfig::default()
        };
        assert!(valid_ipv6.validate().is_empty());

        let no_port = ServerConfig {
            bind: "127.0.0.1".to_string(),
            ..ServerConfig::default()
        };
        let errors = no_port.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("host:port"));

        let port_zero = ServerConfig {
            bind: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        assert!(port_zero.validate()[0].message.contains("cannot be 0"));

        let bad_port = ServerConfig {
            bind: "127.0.0.1:http".to_string(),
            ..ServerConfig::default()
        };
        assert!(bad_port.validate()[0].message.contains("must be a number"));

        let no_buffer = ServerConfig {
            broadcast_buffer: 0,
            ..ServerConfig::default()
        };
        assert_eq!(no_buffer.validate().len(), 1);
    }

    #[test]
    fn test_storage_validation() {
        let empty_path = StorageConfig {
            path: Some(PathBuf::new()),
            ..StorageConfig::default()
        };
        assert!(empty_path.validate()[0].message.contains("cannot be empty"));

        let memory = StorageConfig {
            backend: StorageBackend::Memory,
            path: Some(PathBuf::new()),
            ..StorageConfig::default()
        };
        assert!(memory.validate().is_empty());

        for hours in [0, 169] {
            let storage = StorageConfig {
                retention_hours: hours,
                ..StorageConfig::default()
            };
            assert_eq!(storage.validate().len(), 1, "retention {hours}");
        }
    }

    #[test]
    fn test_collector_validation() {
        let too_fast = CollectorConfig {
            refresh_interval: 30,
            fetch_timeout: 10,
            max_concurrency: None,
        };
        assert!(too_fast.validate()[0].message.contains("too short"));

        let too_slow = CollectorConfig {
            refresh_interval: 100_000,
            ..CollectorConfig::default()
        };
        assert!(too_slow.validate()[0].message.contains("too long"));

        let zero_timeout = CollectorConfig {
            fetch_timeout: 0,
            ..CollectorConfig::default()
        };
        assert!(zero_timeout.validate()[0].message.contains("at least 1"));

        let timeout_exceeds_refresh = CollectorConfig {
            refresh_interval: 60,
            fetch_timeout: 60,
            max_concurrency: None,
        };
        assert!(
            timeout_exceeds_refresh.validate()[0]
                .message
                .contains("shorter than the refresh interval")
        );

        let zero_workers = CollectorConfig {
            max_concurrency: Some(0),
            ..CollectorConfig::default()
        };
        assert_eq!(zero_workers.validate().len(), 1);
    }

    #[test]
    fn test_forecast_validation() {
        for hours in [0, 49] {
            let forecast = ForecastConfig {
                horizon_hours: hours,
                ..ForecastConfig::default()
            };
            assert_eq!(forecast.validate().len(), 1, "horizon {hours}");
        }
        let forecast = ForecastConfig {
            horizon_hours: 48,
            ..ForecastConfig::default()
        };
        assert!(forecast.validate().is_empty());
    }

    #[test]
    fn test_source_validation() {
        let openweather_without_key = SourceConfig {
            provider: Provider::OpenWeather,
            ..SourceConfig::default()
        };
        assert!(openweather_without_key.validate()[0].message.contains("required"));

        let empty_token = SourceConfig {
            token: Some(String::new()),
            ..SourceConfig::default()
        };
        assert_eq!(empty_token.validate().len(), 1);

        let bad_url = SourceConfig {
            base_url: Some("ftp://example.com".to_string()),
            ..SourceConfig::default()
        };
        assert_eq!(bad_url.validate().len(), 1);

        assert!(SourceConfig::default().validate().is_empty());
    }

    #[test]
    fn test_location_validation() {
        let mut config = Config::default();
        config.locations = vec![
            Location::new("", 19.0, 72.8),
            Location::new("Polar", 91.0, 72.8),
            Location::new("Dateline", 19.0, -181.0),
        ];
        let errors = validation_errors(&config);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].field, "locations[0].name");
        assert_eq!(errors[1].field, "locations[1].latitude");
        assert_eq!(errors[2].field, "locations[2].longitude");
    }

    #[test]
    fn test_empty_location_table() {
        let mut config = Config::default();
        config.locations.clear();
        let errors = validation_errors(&config);
        assert!(errors.iter().any(|e| e.field == "locations"));
    }

    #[test]
    fn test_duplicate_location_names_case_insensitive() {
        let mut config = Config::default();
        config.locations = vec![
            Location::new("Bandra", 19.06, 72.83),
            Location::new("BANDRA", 19.07, 72.84),
        ];
        let errors = validation_errors(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("duplicate"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let error = ConfigError::Validation(vec![
            ValidationError {
                field: "server.bind".to_string(),
                message: "port cannot be 0".to_string(),
            },
            ValidationError {
                field: "locations[0].name".to_string(),
                message: "location name cannot be empty".to_string(),
            },
        ]);
        let display = error.to_string();
        assert!(display.contains("  - server.bind: port cannot be 0"));
        assert!(display.contains("locations[0].name"));
    }

    #[test]
    fn test_open_memory_store() {
        let storage = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let store = storage.open().unwrap();
        let store = store.try_lock().unwrap();
        assert_eq!(store.retention(), time::Duration::hours(12));
    }

    #[test]
    fn test_open_csv_store_in_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            path: Some(dir.path().join("data").join("history.csv")),
            ..StorageConfig::default()
        };
        let store = storage.open().unwrap();
        assert!(store.try_lock().unwrap().is_empty().unwrap());
    }
}
