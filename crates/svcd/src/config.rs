//! Configuration for the svc daemons.
//!
//! Resolution order: CLI flags → config file → defaults.
//!
//! Config file location:
//!   1. `$SVC_CONFIG` (explicit override)
//!   2. `<config dir>/svc/config.toml` (e.g. `~/.config/svc/config.toml`)
//!
//! A missing file is not an error; every section and field has a default.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use svc_core::{PortRange, ServiceName};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SVC_CONFIG";

/// Default UDP port of the port registry.
pub const DEFAULT_PRS_PORT: u16 = 30000;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub prs: PrsConfig,
    pub sd: SdConfig,
    pub ft: FtConfig,
    pub advertise: AdvertiseConfig,
}

/// Port registry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrsConfig {
    /// Address the registry binds.
    pub bind_address: IpAddr,
    /// UDP port the registry listens on.
    pub port: u16,
    /// First port handed out to services.
    pub start_port: u16,
    /// Last port handed out to services (inclusive).
    pub end_port: u16,
    /// Seconds without a keep-alive before a lease may be reclaimed.
    pub keep_alive_timeout_secs: u64,
}

/// Session daemon settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdConfig {
    pub service_name: String,
    /// Directory that `/`-prefixed document names resolve under.
    pub document_root: PathBuf,
}

/// File transfer server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FtConfig {
    pub service_name: String,
    /// Directory that requested directory names resolve under.
    pub root: PathBuf,
}

/// How TCP services find and stay registered with the PRS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertiseConfig {
    pub prs_address: SocketAddr,
    /// Address TCP services listen on, with the port leased from the PRS.
    pub bind_address: IpAddr,
    /// Seconds between keep-alives for a held lease.
    pub keep_alive_interval_secs: u64,
    /// Milliseconds to wait for a PRS response.
    pub request_timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            prs: PrsConfig::default(),
            sd: SdConfig::default(),
            ft: FtConfig::default(),
            advertise: AdvertiseConfig::default(),
        }
    }
}

impl Default for PrsConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PRS_PORT,
            start_port: 40000,
            end_port: 40099,
            keep_alive_timeout_secs: 300,
        }
    }
}

impl Default for SdConfig {
    fn default() -> Self {
        Self {
            service_name: "SD Server".to_string(),
            document_root: PathBuf::from("."),
        }
    }
}

impl Default for FtConfig {
    fn default() -> Self {
        Self {
            service_name: "FT Server".to_string(),
            root: PathBuf::from("."),
        }
    }
}

impl Default for AdvertiseConfig {
    fn default() -> Self {
        Self {
            prs_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PRS_PORT),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            keep_alive_interval_secs: 60,
            request_timeout_ms: 2000,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),

    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),

    #[error("invalid client port range {start}-{end}")]
    InvalidPortRange { start: u16, end: u16 },

    #[error("client port range {start}-{end} overlaps the registry port {port}")]
    RangeOverlapsRegistry { start: u16, end: u16, port: u16 },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("invalid service name: {0}")]
    InvalidServiceName(#[from] svc_core::DomainError),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SuiteConfig {
    /// Loads the config file if one exists, otherwise the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::file_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads and parses the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path, if one can be determined.
    pub fn file_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("svc").join("config.toml")))
    }
}

impl PrsConfig {
    /// Checks the port settings and returns the client port range.
    ///
    /// The range must be non-empty with `start < end`, neither bound may be
    /// zero, and neither may coincide with the registry's own port.
    pub fn validate(&self) -> Result<PortRange, ConfigError> {
        let (start, end) = (self.start_port, self.end_port);

        if start >= end || start == 0 || end == 0 {
            return Err(ConfigError::InvalidPortRange { start, end });
        }
        if start == self.port || end == self.port {
            return Err(ConfigError::RangeOverlapsRegistry {
                start,
                end,
                port: self.port,
            });
        }
        if self.keep_alive_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "keep_alive_timeout_secs",
            });
        }

        PortRange::new(start, end).map_err(|_| ConfigError::InvalidPortRange { start, end })
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_secs(self.keep_alive_timeout_secs)
    }
}

impl AdvertiseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keep_alive_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "keep_alive_interval_secs",
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "request_timeout_ms",
            });
        }
        Ok(())
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SdConfig {
    pub fn service_name(&self) -> Result<ServiceName, ConfigError> {
        Ok(ServiceName::new(self.service_name.as_str())?)
    }
}

impl FtConfig {
    pub fn service_name(&self) -> Result<ServiceName, ConfigError> {
        Ok(ServiceName::new(self.service_name.as_str())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SuiteConfig::default();
        assert_eq!(config.prs.port, 30000);
        assert_eq!(config.prs.start_port, 40000);
        assert_eq!(config.prs.end_port, 40099);
        assert_eq!(config.prs.keep_alive_timeout(), Duration::from_secs(300));
        assert_eq!(config.sd.service_name, "SD Server");
        assert_eq!(config.ft.service_name, "FT Server");
        assert_eq!(config.advertise.prs_address.to_string(), "127.0.0.1:30000");
    }

    #[test]
    fn test_default_port_range_is_valid() {
        let range = PrsConfig::default().validate().unwrap();
        assert_eq!(range.len(), 100);
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let base = PrsConfig::default();

        let inverted = PrsConfig {
            start_port: 40099,
            end_port: 40000,
            ..base.clone()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::InvalidPortRange { .. })
        ));

        // A single-port range is rejected; start must be strictly below end
        let single = PrsConfig {
            start_port: 40000,
            end_port: 40000,
            ..base.clone()
        };
        assert!(single.validate().is_err());

        let zero = PrsConfig {
            start_port: 0,
            ..base.clone()
        };
        assert!(zero.validate().is_err());

        let overlap = PrsConfig {
            start_port: 30000,
            ..base.clone()
        };
        assert!(matches!(
            overlap.validate(),
            Err(ConfigError::RangeOverlapsRegistry { port: 30000, .. })
        ));

        let no_timeout = PrsConfig {
            keep_alive_timeout_secs: 0,
            ..base
        };
        assert!(matches!(
            no_timeout.validate(),
            Err(ConfigError::ZeroDuration { .. })
        ));
    }

    #[test]
    fn test_advertise_validate() {
        assert!(AdvertiseConfig::default().validate().is_ok());

        let config = AdvertiseConfig {
            keep_alive_interval_secs: 0,
            ..AdvertiseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[prs]
port = 31000
keep_alive_timeout_secs = 10

[sd]
document_root = "/srv/docs"
"#,
        )
        .unwrap();

        let config = SuiteConfig::load_from(&path).unwrap();
        assert_eq!(config.prs.port, 31000);
        assert_eq!(config.prs.keep_alive_timeout_secs, 10);
        assert_eq!(config.prs.start_port, 40000);
        assert_eq!(config.sd.document_root, PathBuf::from("/srv/docs"));
        assert_eq!(config.sd.service_name, "SD Server");
        assert_eq!(config.ft, FtConfig::default());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[prs]\nport = \"high\"\n").unwrap();

        assert!(matches!(
            SuiteConfig::load_from(&path),
            Err(ConfigError::ParseFailed(..))
        ));
    }

    #[test]
    fn test_service_names_validate() {
        let config = SuiteConfig::default();
        assert_eq!(config.sd.service_name().unwrap().as_str(), "SD Server");

        let long = SdConfig {
            service_name: "x".repeat(80),
            ..SdConfig::default()
        };
        assert!(long.service_name().is_err());
    }
}
