/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Exporter configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! command line flags and environment variables.

use crate::adapters::DEFAULT_COMMAND_TIMEOUT;
use crate::domain::services::DEFAULT_CACHE_DURATION;
use crate::domain::{CacheSettings, CollectorRegistry, ConfigError, DEFAULT_COLLECTORS, DEFAULT_OMREPORT_EXECUTABLE};
use log::{warn, LevelFilter};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9137";
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Complete exporter configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    /// Collectors to run on every scrape
    pub collectors_enabled: Vec<String>,
    /// Collectors added on top of `collectors_enabled`
    pub collectors_additional: Vec<String>,
    /// NIC names to report; empty reports every NIC
    pub monitored_nics: Vec<String>,
    /// Path of the omreport executable
    pub omreport_executable: String,
    /// Deadline of one omreport invocation, in seconds
    pub cmd_timeout: u64,
    /// Address the HTTP server binds to
    pub listen_address: String,
    /// Path of the metrics endpoint
    pub telemetry_path: String,
    pub cache_enabled: bool,
    /// Cache lifetime, in seconds
    pub cache_duration: u64,
    pub log_level: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            collectors_enabled: DEFAULT_COLLECTORS.iter().map(|s| s.to_string()).collect(),
            collectors_additional: Vec::new(),
            monitored_nics: Vec::new(),
            omreport_executable: DEFAULT_OMREPORT_EXECUTABLE.to_string(),
            cmd_timeout: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
            cache_enabled: false,
            cache_duration: DEFAULT_CACHE_DURATION.as_secs(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Values given explicitly on the command line or in the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub collectors_enabled: Option<Vec<String>>,
    pub collectors_additional: Option<Vec<String>>,
    pub monitored_nics: Option<Vec<String>>,
    pub omreport_executable: Option<String>,
    pub cmd_timeout: Option<u64>,
    pub listen_address: Option<String>,
    pub telemetry_path: Option<String>,
    pub cache_enabled: Option<bool>,
    pub cache_duration: Option<u64>,
    pub log_level: Option<String>,
}

impl ExporterConfig {
    /// Load a TOML configuration file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply explicit overrides on top of this configuration
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(v) = overrides.collectors_enabled {
            self.collectors_enabled = v;
        }
        if let Some(v) = overrides.collectors_additional {
            self.collectors_additional = v;
        }
        if let Some(v) = overrides.monitored_nics {
            self.monitored_nics = v;
        }
        if let Some(v) = overrides.omreport_executable {
            self.omreport_executable = v;
        }
        if let Some(v) = overrides.cmd_timeout {
            self.cmd_timeout = v;
        }
        if let Some(v) = overrides.listen_address {
            self.listen_address = v;
        }
        if let Some(v) = overrides.telemetry_path {
            self.telemetry_path = v;
        }
        if let Some(v) = overrides.cache_enabled {
            self.cache_enabled = v;
        }
        if let Some(v) = overrides.cache_duration {
            self.cache_duration = v;
        }
        if let Some(v) = overrides.log_level {
            self.log_level = v;
        }
        self
    }

    /// Enabled plus additional collectors, blanks removed, first occurrence kept
    pub fn collector_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.collectors_enabled.iter().chain(&self.collectors_additional) {
            let name = name.trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Command deadline; zero falls back to the default
    pub fn command_timeout(&self) -> Duration {
        if self.cmd_timeout == 0 {
            warn!(
                "Command timeout of zero is not allowed, using {}s",
                DEFAULT_COMMAND_TIMEOUT.as_secs()
            );
            return DEFAULT_COMMAND_TIMEOUT;
        }
        Duration::from_secs(self.cmd_timeout)
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            enabled: self.cache_enabled,
            duration: Duration::from_secs(self.cache_duration),
        }
    }

    /// Socket address to bind; `:9137` binds every interface
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = self.listen_address.trim();
        let address = match address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => address.to_string(),
        };
        address.parse().map_err(|_| ConfigError::InvalidValue {
            field: "listen_address".to_string(),
            value: self.listen_address.clone(),
        })
    }

    /// Log filter from the configured level
    pub fn log_filter(&self) -> Result<LevelFilter, ConfigError> {
        match self.log_level.to_lowercase().as_str() {
            "debug" => Ok(LevelFilter::Debug),
            "info" => Ok(LevelFilter::Info),
            "warn" | "warning" => Ok(LevelFilter::Warn),
            "error" => Ok(LevelFilter::Error),
            _ => Err(invalid("log_level", &self.log_level)),
        }
    }

    /// Check everything that would otherwise fail after start-up
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(unknown) = self
            .collector_names()
            .into_iter()
            .find(|name| !CollectorRegistry::contains(name))
        {
            return Err(ConfigError::UnknownCollector(unknown));
        }

        let path = &self.telemetry_path;
        if !path.starts_with('/') || path == "/" || path.contains(['{', '}', ':', '*']) {
            return Err(invalid("telemetry_path", path));
        }

        if self.omreport_executable.trim().is_empty() {
            return Err(invalid("omreport_executable", &self.omreport_executable));
        }

        if self.cache_enabled && self.cache_duration == 0 {
            return Err(invalid("cache_duration", "0"));
        }

        self.socket_addr()?;
        self.log_filter()?;
        Ok(())
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::default();
        assert_eq!(config.collectors_enabled.len(), 18);
        assert_eq!(config.command_timeout(), Duration::from_secs(15));
        assert_eq!(config.socket_addr().unwrap().port(), 9137);
        assert_eq!(config.telemetry_path, "/metrics");
        assert!(!config.cache_settings().enabled);
        assert_eq!(config.cache_settings().duration, Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_keeps_defaults_for_missing_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
collectors_enabled = ["chassis", "fans"]
monitored_nics = ["eno1"]
cache_enabled = true
cache_duration = 60
"#
        )
        .unwrap();

        let config = ExporterConfig::from_file(file.path()).unwrap();
        assert_eq!(config.collectors_enabled, vec!["chassis", "fans"]);
        assert_eq!(config.monitored_nics, vec!["eno1"]);
        assert_eq!(config.cache_settings().duration, Duration::from_secs(60));
        assert_eq!(config.listen_address, DEFAULT_LISTEN_ADDRESS);
        assert_eq!(config.cmd_timeout, 15);
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            ExporterConfig::from_file(Path::new("/definitely/not/a/config.toml")),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(
            ExporterConfig::from_toml_str("cache_enabled = \"maybe\""),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            ExporterConfig::from_toml_str("listen_port = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let config = ExporterConfig::from_toml_str("cmd_timeout = 30\ntelemetry_path = \"/dell\"")
            .unwrap()
            .merge(ConfigOverrides {
                cmd_timeout: Some(5),
                collectors_additional: Some(vec!["chassis_info".to_string()]),
                ..Default::default()
            });

        assert_eq!(config.command_timeout(), Duration::from_secs(5));
        assert_eq!(config.telemetry_path, "/dell");
        assert!(config.collector_names().contains(&"chassis_info".to_string()));
    }

    #[test]
    fn test_collector_names_deduplicated() {
        let config = ExporterConfig {
            collectors_enabled: vec!["fans".into(), " temps".into(), "".into()],
            collectors_additional: vec!["fans".into(), "nics".into()],
            ..Default::default()
        };
        assert_eq!(config.collector_names(), vec!["fans", "temps", "nics"]);
    }

    #[test]
    fn test_zero_timeout_keeps_default() {
        let config = ExporterConfig {
            cmd_timeout: 0,
            ..Default::default()
        };
        assert_eq!(config.command_timeout(), DEFAULT_COMMAND_TIMEOUT);
    }

    #[test]
    fn test_listen_address_forms() {
        let mut config = ExporterConfig {
            listen_address: ":9137".to_string(),
            ..Default::default()
        };
        assert_eq!(config.socket_addr().unwrap(), "0.0.0.0:9137".parse().unwrap());

        config.listen_address = "127.0.0.1:8080".to_string();
        assert_eq!(config.socket_addr().unwrap().port(), 8080);

        config.listen_address = "nowhere".to_string();
        assert!(matches!(config.socket_addr(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let unknown = ExporterConfig {
            collectors_additional: vec!["gpu".into()],
            ..Default::default()
        };
        assert!(matches!(unknown.validate(), Err(ConfigError::UnknownCollector(name)) if name == "gpu"));

        for path in ["/", "metrics", "/{name}"] {
            let config = ExporterConfig {
                telemetry_path: path.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{path} accepted");
        }

        let config = ExporterConfig {
            log_level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ExporterConfig {
            log_level: "WARNING".to_string(),
            ..Default::default()
        };
        assert_eq!(config.log_filter().unwrap(), LevelFilter::Warn);
    }
}
