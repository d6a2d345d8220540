//! Configuration structures for the daemon.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{VoxError, VoxResult};

/// Well-known port the daemon binds on. Binding doubles as the
/// single-instance lock: a second daemon fails to bind and exits.
pub const DEFAULT_PORT: u16 = 7123;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address (loopback only; the daemon is a local service).
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Minutes without synthesis activity before the daemon shuts itself down.
    #[serde(default = "default_idle_timeout_mins")]
    pub idle_timeout_mins: u64,
    /// Maximum number of loaded voice states kept resident.
    #[serde(default = "default_voice_cache_capacity")]
    pub voice_cache_capacity: usize,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_idle_timeout_mins() -> u64 {
    60
}

fn default_voice_cache_capacity() -> usize {
    8
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            idle_timeout_mins: default_idle_timeout_mins(),
            voice_cache_capacity: default_voice_cache_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Socket address the daemon binds on.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Idle timeout as a duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_mins * 60)
    }

    /// Apply environment overrides: `VOXD_PORT`, `VOXD_IDLE_TIMEOUT_MINS`,
    /// `VOXD_LOG_FILE`.
    pub fn apply_env(mut self) -> VoxResult<Self> {
        if let Ok(v) = std::env::var("VOXD_PORT") {
            self.port = v
                .parse()
                .map_err(|_| VoxError::config(format!("invalid VOXD_PORT: {v}")))?;
        }
        if let Ok(v) = std::env::var("VOXD_IDLE_TIMEOUT_MINS") {
            self.idle_timeout_mins = v
                .parse()
                .map_err(|_| VoxError::config(format!("invalid VOXD_IDLE_TIMEOUT_MINS: {v}")))?;
        }
        if let Ok(v) = std::env::var("VOXD_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(v));
        }
        Ok(self)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Append log output to this file in addition to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

/// Default log file for a daemon spawned detached from any terminal.
pub fn default_daemon_log_file() -> PathBuf {
    std::env::temp_dir().join("voxd.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_config_default() {
        let config = DaemonConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.idle_timeout_mins, 60);
        assert_eq!(config.voice_cache_capacity, 8);
        assert!(config.host.is_loopback());
    }

    #[test]
    fn test_idle_timeout_conversion() {
        let config = DaemonConfig {
            idle_timeout_mins: 2,
            ..Default::default()
        };
        assert_eq!(config.idle_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_bind_addr() {
        let config = DaemonConfig::default();
        assert_eq!(config.bind_addr().port(), DEFAULT_PORT);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: DaemonConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }
}
