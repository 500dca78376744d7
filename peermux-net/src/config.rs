//! Node network configuration.
//!
//! Loaded from a YAML file, then overridden by `PEERMUX_*` environment
//! variables. Every field has a default so an empty file (or no file at
//! all) yields a working local setup.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Network settings for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    pub listen: ListenConfig,
    pub connect: ConnectConfig,
    pub tls: TlsSettings,
}

/// Where this node accepts incoming links.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    #[serde(with = "socket_addr_serde")]
    pub addr: SocketAddr,
}

/// Where this node dials out to, if anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Remote address as `host:port`. `None` means this node only
    /// listens.
    pub addr: Option<String>,
    pub connect_timeout_secs: u64,
    pub nodelay: bool,
}

/// TLS material and verification options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    pub enabled: bool,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    /// Name presented for SNI and certificate verification when
    /// dialing. Defaults to the host part of `connect.addr`.
    pub server_name: Option<String>,
    pub insecure_skip_verify: bool,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            listen: ListenConfig::default(),
            connect: ConnectConfig::default(),
            tls: TlsSettings::default(),
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            addr: SocketAddr::from(([127, 0, 0, 1], 7464)),
        }
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        ConnectConfig {
            addr: None,
            connect_timeout_secs: 10,
            nodelay: true,
        }
    }
}

impl Default for TlsSettings {
    fn default() -> Self {
        TlsSettings {
            enabled: false,
            cert_file: None,
            key_file: None,
            ca_file: None,
            server_name: None,
            insecure_skip_verify: false,
        }
    }
}

impl NetConfig {
    /// Loads configuration from the path in `PEERMUX_CONFIG`, falling
    /// back to defaults when the variable is unset or the file is
    /// missing. Environment overrides are applied either way.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("PEERMUX_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => NetConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reads configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Writes the configuration out as YAML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, contents).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))
    }

    /// Applies `PEERMUX_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PEERMUX_LISTEN_ADDR") {
            if let Ok(addr) = v.parse() {
                self.listen.addr = addr;
            }
        }
        if let Ok(v) = std::env::var("PEERMUX_CONNECT_ADDR") {
            self.connect.addr = Some(v);
        }
        if let Ok(v) = std::env::var("PEERMUX_NODELAY") {
            if let Ok(nodelay) = v.parse() {
                self.connect.nodelay = nodelay;
            }
        }
        if let Ok(v) = std::env::var("PEERMUX_TLS_ENABLED") {
            if let Ok(enabled) = v.parse() {
                self.tls.enabled = enabled;
            }
        }
        if let Ok(v) = std::env::var("PEERMUX_TLS_CERT_FILE") {
            self.tls.cert_file = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PEERMUX_TLS_KEY_FILE") {
            self.tls.key_file = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PEERMUX_TLS_CA_FILE") {
            self.tls.ca_file = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PEERMUX_TLS_SERVER_NAME") {
            self.tls.server_name = Some(v);
        }
        if let Ok(v) = std::env::var("PEERMUX_TLS_INSECURE") {
            if let Ok(insecure) = v.parse() {
                self.tls.insecure_skip_verify = insecure;
            }
        }
    }

    /// Checks the configuration for contradictions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tls.enabled {
            if self.tls.cert_file.is_some() != self.tls.key_file.is_some() {
                return Err(ConfigError::ValidationError(
                    "tls.cert_file and tls.key_file must be provided together".to_string(),
                ));
            }
            if self.tls.insecure_skip_verify && self.tls.ca_file.is_some() {
                return Err(ConfigError::ValidationError(
                    "tls.ca_file conflicts with tls.insecure_skip_verify".to_string(),
                ));
            }
        }
        if self.connect.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect.connect_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Name to verify the remote certificate against when dialing.
    pub fn effective_server_name(&self) -> Option<String> {
        if let Some(name) = &self.tls.server_name {
            return Some(name.clone());
        }
        let addr = self.connect.addr.as_deref()?;
        let host = addr.rsplit_once(':').map(|(h, _)| h).unwrap_or(addr);
        Some(host.to_string())
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(path, err) => {
                write!(f, "cannot read config file {}: {}", path.display(), err)
            }
            ConfigError::ParseError(path, err) => {
                write!(f, "cannot parse config file {}: {}", path.display(), err)
            }
            ConfigError::ValidationError(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

mod socket_addr_serde {
    use std::net::SocketAddr;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SocketAddr, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = NetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen.addr.port(), 7464);
        assert!(config.connect.addr.is_none());
        assert!(config.connect.nodelay);
        assert!(!config.tls.enabled);
    }

    #[test]
    fn yaml_round_trip() {
        let mut config = NetConfig::default();
        config.connect.addr = Some("peer.example.com:7464".to_string());
        config.tls.enabled = true;
        config.tls.ca_file = Some(PathBuf::from("/etc/peermux/ca.pem"));

        let file = NamedTempFile::new().unwrap();
        config.save(file.path()).unwrap();

        let loaded = NetConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.listen.addr, config.listen.addr);
        assert_eq!(loaded.connect.addr, config.connect.addr);
        assert!(loaded.tls.enabled);
        assert_eq!(loaded.tls.ca_file, config.tls.ca_file);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "listen:\n  addr: \"0.0.0.0:9000\"").unwrap();

        let config = NetConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen.addr.port(), 9000);
        assert_eq!(config.connect.connect_timeout_secs, 10);
        assert!(!config.tls.enabled);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = NetConfig::from_file(Path::new("/nonexistent/peermux.yaml"));
        assert!(matches!(result, Err(ConfigError::IoError(_, _))));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "listen: [this is not a mapping").unwrap();

        let result = NetConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_, _))));
    }

    #[test]
    fn cert_without_key_fails_validation() {
        let mut config = NetConfig::default();
        config.tls.enabled = true;
        config.tls.cert_file = Some(PathBuf::from("/etc/peermux/cert.pem"));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn insecure_with_ca_fails_validation() {
        let mut config = NetConfig::default();
        config.tls.enabled = true;
        config.tls.insecure_skip_verify = true;
        config.tls.ca_file = Some(PathBuf::from("/etc/peermux/ca.pem"));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn env_overrides_take_effect() {
        std::env::set_var("PEERMUX_LISTEN_ADDR", "127.0.0.1:9123");
        std::env::set_var("PEERMUX_CONNECT_ADDR", "remote.example.com:9124");
        std::env::set_var("PEERMUX_TLS_INSECURE", "true");

        let mut config = NetConfig::default();
        config.apply_env_overrides();

        std::env::remove_var("PEERMUX_LISTEN_ADDR");
        std::env::remove_var("PEERMUX_CONNECT_ADDR");
        std::env::remove_var("PEERMUX_TLS_INSECURE");

        assert_eq!(config.listen.addr.port(), 9123);
        assert_eq!(
            config.connect.addr.as_deref(),
            Some("remote.example.com:9124")
        );
        assert!(config.tls.insecure_skip_verify);
    }

    #[test]
    fn server_name_falls_back_to_connect_host() {
        let mut config = NetConfig::default();
        assert!(config.effective_server_name().is_none());

        config.connect.addr = Some("peer.example.com:7464".to_string());
        assert_eq!(
            config.effective_server_name().as_deref(),
            Some("peer.example.com")
        );

        config.tls.server_name = Some("override.example.com".to_string());
        assert_eq!(
            config.effective_server_name().as_deref(),
            Some("override.example.com")
        );
    }
}
