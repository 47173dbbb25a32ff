//! Harvester configuration.
//!
//! Loaded once at startup from a JSON file and immutable afterwards. Every
//! section and key is optional; unknown keys are rejected so that typos fail
//! loudly instead of silently falling back to defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Targets probed when `network.ping_targets` is empty.
pub const DEFAULT_PING_TARGETS: [&str; 3] = ["8.8.8.8", "1.1.1.1", "google.com"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
    pub containers: ContainersConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
    /// Load-generator settings shared with the benchmarking tool's config
    /// file. Accepted and ignored here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmarking: Option<serde_json::Value>,
}

impl Config {
    /// Reads, parses and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(raw, "<inline>")
    }

    fn parse(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.listen_addr()?;

        non_zero("server.read_timeout", self.server.read_timeout)?;
        non_zero("server.write_timeout", self.server.write_timeout)?;
        non_zero("server.shutdown_timeout", self.server.shutdown_timeout)?;
        non_zero("metrics.collection_interval", self.metrics.collection_interval)?;
        non_zero("metrics.command_timeout", self.metrics.command_timeout)?;
        if let Some(cycle) = self.metrics.cycle_timeout {
            non_zero("metrics.cycle_timeout", cycle)?;
        }

        if self.network.ping_count == 0 {
            return Err(ConfigError::Invalid {
                key: "network.ping_count",
                reason: "must be at least 1".into(),
            });
        }
        if tracing::Level::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::Invalid {
                key: "logging.level",
                reason: format!("unknown level {:?}", self.logging.level),
            });
        }
        Ok(())
    }
}

fn non_zero(key: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

// ============ Server ============

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// `:8080` (all interfaces) or `host:8080`.
    pub port: String,
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: ":8080".to_string(),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Bind address for the HTTP listener. A bare `:port` binds every
    /// IPv4 interface.
    pub fn listen_addr(&self) -> Result<String, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            key: "server.port",
            reason: format!("{reason} in {:?}", self.port),
        };
        let (host, port) = self
            .port
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected `:port` or `host:port`"))?;
        port.parse::<u16>()
            .map_err(|_| invalid("port is not a number between 0 and 65535"))?;
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        Ok(format!("{host}:{port}"))
    }
}

// ============ Metrics ============

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(with = "humantime_serde")]
    pub collection_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    /// Budget of one whole cycle. Defaults to the collection interval.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub cycle_timeout: Option<Duration>,
    pub enable_system_metrics: bool,
    pub enable_container_metrics: bool,
    pub enable_network_metrics: bool,
    /// Paths handed to `df`; empty reports every mounted filesystem.
    pub disk_paths: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            collection_interval: Duration::from_secs(15),
            command_timeout: Duration::from_secs(10),
            cycle_timeout: None,
            enable_system_metrics: true,
            enable_container_metrics: true,
            enable_network_metrics: true,
            disk_paths: vec!["/".to_string()],
        }
    }
}

impl MetricsConfig {
    pub fn cycle_timeout(&self) -> Duration {
        self.cycle_timeout.unwrap_or(self.collection_interval)
    }
}

// ============ Containers ============

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainersConfig {
    pub docker_enabled: bool,
    pub podman_enabled: bool,
    /// Allow-list. Non-empty switches to one stats call per container.
    pub monitored_names: Vec<String>,
    /// Deny-list, applied in both modes.
    pub ignored_names: Vec<String>,
}

impl Default for ContainersConfig {
    fn default() -> Self {
        Self {
            docker_enabled: true,
            podman_enabled: true,
            monitored_names: Vec::new(),
            ignored_names: Vec::new(),
        }
    }
}

// ============ Network ============

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub ping_targets: Vec<String>,
    pub ping_count: u32,
    pub monitor_loopback: bool,
    pub ignored_interfaces: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ping_targets: Vec::new(),
            ping_count: 3,
            monitor_loopback: false,
            ignored_interfaces: Vec::new(),
        }
    }
}

impl NetworkConfig {
    /// Configured targets, or the defaults when none are configured.
    pub fn ping_targets(&self) -> Vec<String> {
        if self.ping_targets.is_empty() {
            DEFAULT_PING_TARGETS.iter().map(|t| t.to_string()).collect()
        } else {
            self.ping_targets.clone()
        }
    }
}

// ============ Logging ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = Config::from_json_str("{}").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.server.listen_addr().unwrap(), "0.0.0.0:8080");
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.metrics.collection_interval, Duration::from_secs(15));
        assert_eq!(config.metrics.cycle_timeout(), Duration::from_secs(15));
        assert_eq!(config.metrics.disk_paths, vec!["/"]);
        assert!(config.containers.docker_enabled && config.containers.podman_enabled);
        assert_eq!(config.network.ping_targets(), vec!["8.8.8.8", "1.1.1.1", "google.com"]);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_full_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "server": {{ "port": "127.0.0.1:9100", "read_timeout": "5s" }},
                "metrics": {{
                    "collection_interval": "1m 30s",
                    "cycle_timeout": "45s",
                    "enable_container_metrics": false,
                    "disk_paths": []
                }},
                "containers": {{ "monitored_names": ["web"], "ignored_names": ["db"] }},
                "network": {{ "ping_targets": ["10.0.0.1"], "ping_count": 5, "monitor_loopback": true }},
                "logging": {{ "level": "debug", "format": "text" }},
                "benchmarking": {{ "max_concurrency": 10 }}
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.listen_addr().unwrap(), "127.0.0.1:9100");
        assert_eq!(config.server.read_timeout, Duration::from_secs(5));
        assert_eq!(config.server.write_timeout, Duration::from_secs(10));
        assert_eq!(config.metrics.collection_interval, Duration::from_secs(90));
        assert_eq!(config.metrics.cycle_timeout(), Duration::from_secs(45));
        assert!(!config.metrics.enable_container_metrics);
        assert!(config.metrics.disk_paths.is_empty());
        assert_eq!(config.containers.monitored_names, vec!["web"]);
        assert_eq!(config.network.ping_targets(), vec!["10.0.0.1"]);
        assert_eq!(config.network.ping_count, 5);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = Config::from_json_str(r#"{"metrics": {"colection_interval": "5s"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("colection_interval"));
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        let err = Config::from_json_str(r#"{"metrics": {"command_timeout": "soon"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = Config::from_json_str(r#"{"metrics": {"collection_interval": "0s"}}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "metrics.collection_interval", .. }
        ));
    }

    #[test]
    fn test_bad_port_is_rejected() {
        for port in ["8080", ":http", "host:99999"] {
            let raw = format!(r#"{{"server": {{"port": "{port}"}}}}"#);
            let err = Config::from_json_str(&raw).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: "server.port", .. }),
                "{port}"
            );
        }
    }

    #[test]
    fn test_bad_log_level_is_rejected() {
        let err = Config::from_json_str(r#"{"logging": {"level": "loud"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "logging.level", .. }));
    }

    #[test]
    fn test_shipped_sample_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/harvester.json");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.network.ignored_interfaces, vec!["docker0"]);
        assert_eq!(config.metrics.cycle_timeout(), config.metrics.collection_interval);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/harvester.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
