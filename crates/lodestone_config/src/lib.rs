//! Server configuration loaded from a JSON file.
//!
//! Unknown keys are ignored so older configs keep working; every field has
//! a default so an empty `{}` document is a valid configuration.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path:   String,
        source: std::io::Error,
    },

    #[error("malformed configuration in {path}: {source}")]
    Parse {
        path:   String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP bind port.
    pub port: u16,

    /// Interface the listener binds to.
    pub bind_address: String,

    /// Text shown in the server list.
    pub motd: String,

    /// Connection cap; logins past it are refused.
    pub max_players: u32,

    /// Enables session-server verification during login.
    pub online_mode: bool,

    /// Payload size at or above which outbound packets are deflated.
    /// Negative disables compression entirely.
    pub compression_threshold: i32,

    /// Interval between KeepAlive emissions in the Play state.
    pub keepalive_interval_ms: u32,

    /// Maximum time to wait for a KeepAlive echo before disconnecting.
    pub keepalive_timeout_ms: u32,

    /// Idle grace window in the Play state: any inbound packet refreshes
    /// it, and a connection that stays silent past it is dropped. The
    /// KeepAlive echo deadline is independent of this window.
    pub idle_timeout_ms: u32,

    /// Accept-to-LoginSuccess deadline.
    pub login_timeout_ms: u32,

    /// Bound of the per-connection outbound packet queue.
    pub outbound_queue_depth: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port:                  25565,
            bind_address:          "0.0.0.0".to_string(),
            motd:                  "A Lodestone Server".to_string(),
            max_players:           20,
            online_mode:           false,
            compression_threshold: 256,
            keepalive_interval_ms: 20_000,
            keepalive_timeout_ms:  30_000,
            idle_timeout_ms:       50_000,
            login_timeout_ms:      30_000,
            outbound_queue_depth:  256,
        }
    }
}

impl ServerConfig {
    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        info!("[CONFIG] Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            info!("[CONFIG] No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn compression_enabled(&self) -> bool {
        self.compression_threshold >= 0
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 25565);
        assert_eq!(config.max_players, 20);
        assert!(!config.online_mode);
        assert!(config.compression_enabled());
        assert_eq!(config.idle_timeout_ms, 50_000);
    }

    #[test]
    fn test_empty_document_is_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.port, ServerConfig::default().port);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"port": 25570, "rcon_password": "hunter2"}"#).unwrap();
        assert_eq!(config.port, 25570);
    }

    #[test]
    fn test_negative_threshold_disables_compression() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"compression_threshold": -1}"#).unwrap();
        assert!(!config.compression_enabled());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = std::env::temp_dir().join("lodestone_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(ServerConfig::load(&path), Err(ConfigError::Parse { .. })));
        std::fs::remove_file(&path).ok();
    }
}
