//! Service configuration management
//!
//! Layered: built-in defaults, then an optional TOML file, then environment
//! variables prefixed `RSVP__` with `__` between path segments, e.g.
//! `RSVP__INGEST__WORKERS=16` or `RSVP__STORAGE__DATABASE__URL=postgres://...`.

use ::config::{Config, Environment, File, FileFormat};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use event_cache::CacheConfig;
use rsvp_api::ApiConfig;
use rsvp_ingest::IngestConfig;
use rsvp_storage::StorageConfig;
use rsvp_stream::StreamConfig;

const ENV_PREFIX: &str = "RSVP";
const ENV_SEPARATOR: &str = "__";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 3] = ["json", "pretty", "compact"];

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Storage engine configuration
    pub storage: StorageConfig,

    /// Cache layer and read path configuration
    pub cache: CacheConfig,

    /// Record queue and feed configuration
    pub stream: StreamConfig,

    /// Ingestion pool configuration
    pub ingest: IngestConfig,

    /// HTTP surface configuration
    pub api: ApiConfig,

    /// Service-level configuration
    pub service: ServiceSettings,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter
    pub enabled: bool,

    /// Address serving `GET /metrics`
    pub bind_address: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { shutdown_timeout_secs: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true, bind_address: "0.0.0.0:9090".to_string() }
    }
}

impl ServiceSettings {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl MetricsConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address.parse().with_context(|| format!("invalid metrics bind_address {:?}", self.bind_address))
    }
}

impl ServiceConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!("logging level must be one of {:?}, got {:?}", LOG_LEVELS, self.logging.level);
        }

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            bail!("logging format must be one of {:?}, got {:?}", LOG_FORMATS, self.logging.format);
        }

        if self.service.shutdown_timeout_secs == 0 {
            bail!("service shutdown_timeout_secs must be greater than 0");
        }

        if self.metrics.enabled {
            self.metrics.socket_addr()?;
        }

        self.storage.database.validate().map_err(anyhow::Error::msg)?;
        self.cache.validate().map_err(anyhow::Error::msg)?;
        self.stream.validate().map_err(anyhow::Error::msg)?;
        self.ingest.validate().map_err(anyhow::Error::msg)?;
        self.api.validate().map_err(anyhow::Error::msg)?;

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }
}

/// Load configuration from a TOML file (if given) and the process environment
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    build_config(path, None)
}

/// `env` replaces the process environment when set
fn build_config(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<ServiceConfig> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        tracing::debug!("Loading configuration from file: {:?}", path);
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }

    let environment = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .source(env);

    let config: ServiceConfig = builder
        .add_source(environment)
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_cache::CacheBackend;
    use rsvp_storage::StorageBackend;
    use std::io::Write;

    fn no_env() -> Option<HashMap<String, String>> {
        Some(HashMap::new())
    }

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = build_config(None, no_env()).unwrap();

        assert_eq!(config.ingest.workers, 8);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.service.shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_file() {
        let file = write_toml(
            r#"
            [storage]
            backend = "memory"

            [cache]
            backend = "memory"
            ttl_secs = 30

            [ingest]
            workers = 3
            save_timeout_ms = 250

            [logging]
            format = "json"
            "#,
        );

        let config = build_config(Some(file.path()), no_env()).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.ingest.workers, 3);
        assert_eq!(config.ingest.save_timeout(), Duration::from_millis(250));
        assert_eq!(config.logging.format, "json");
        // Untouched sections keep their defaults
        assert_eq!(config.api.max_k, 100);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_toml("[ingest]\nworkers = 3\n");
        let env = HashMap::from([
            ("RSVP__INGEST__WORKERS".to_string(), "12".to_string()),
            ("RSVP__STORAGE__DATABASE__URL".to_string(), "postgres://db:5432/rsvps".to_string()),
            ("RSVP__METRICS__ENABLED".to_string(), "false".to_string()),
        ]);

        let config = build_config(Some(file.path()), Some(env)).unwrap();

        assert_eq!(config.ingest.workers, 12);
        assert_eq!(config.storage.database.url, "postgres://db:5432/rsvps");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(build_config(Some(Path::new("/nonexistent/rsvp.toml")), no_env()).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for contents in [
            "[logging]\nlevel = \"loud\"\n",
            "[logging]\nformat = \"xml\"\n",
            "[ingest]\nworkers = 0\n",
            "[storage]\nbackend = \"mysql\"\n",
            "[api]\nbind_address = \"nowhere\"\n",
        ] {
            let file = write_toml(contents);
            assert!(build_config(Some(file.path()), no_env()).is_err(), "{contents}");
        }
    }

    #[test]
    fn test_renders_as_toml() {
        let rendered = ServiceConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[ingest]"));
        assert!(rendered.contains("workers = 8"));
    }
}
