//! Configuration file format.
//!
//! ```toml
//! name = "Living room lights"
//! port = "/dev/ttyACM0"
//! baud_rate = 9600
//! delimiter = "lf"
//!
//! [dispatch]
//! optimistic = "always"
//! refresh_after_write = false
//!
//! [web]
//! listen = "127.0.0.1:8581"
//!
//! [[accessories]]
//! id = "ceiling"
//! name = "Ceiling"
//! channel = 1
//! ```

use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;

use lightctl_protocol::{LineDelimiter, DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PORT};

use crate::accessory::DeviceEntry;
use crate::dispatch::DispatchPolicy;
use crate::transport::SerialSettings;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lightctl.toml";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub name: Option<String>,
    #[serde(alias = "serial_port")]
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub delimiter: Option<LineDelimiter>,
    #[serde(default)]
    pub dispatch: DispatchPolicy,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub web: WebSection,
    /// Kept untyped so a malformed list does not fail the whole file.
    pub accessories: Option<toml::Value>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct WebSection {
    pub listen: Option<String>,
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigFile::from_toml(&contents)
}

impl ConfigFile {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Platform name, trimmed.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            path: self
                .port
                .clone()
                .unwrap_or_else(|| DEFAULT_SERIAL_PORT.to_string()),
            baud_rate: self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            delimiter: self.delimiter.unwrap_or_default(),
        }
    }

    /// The configured device list.
    ///
    /// Anything other than an array yields no devices. Entries that do not
    /// deserialize are skipped.
    pub fn devices(&self) -> Vec<DeviceEntry> {
        let entries = match &self.accessories {
            None => return Vec::new(),
            Some(toml::Value::Array(entries)) => entries,
            Some(other) => {
                warn!(
                    "'accessories' is a {}, not a list; starting with no accessories",
                    other.type_str()
                );
                return Vec::new();
            }
        };

        entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| match entry.clone().try_into::<DeviceEntry>() {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!("Skipping accessory entry {}: {}", i, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::OptimisticUpdate;
    use lightctl_protocol::Channel;

    #[test]
    fn test_defaults() {
        let config = ConfigFile::from_toml("").unwrap();
        let serial = config.serial_settings();
        assert_eq!(serial.path, "/dev/ttyACM0");
        assert_eq!(serial.baud_rate, 9600);
        assert_eq!(serial.delimiter, LineDelimiter::Lf);
        assert_eq!(config.dispatch, DispatchPolicy::default());
        assert!(config.devices().is_empty());
        assert_eq!(config.display_name(), None);
    }

    #[test]
    fn test_full_config() {
        let config = ConfigFile::from_toml(
            r#"
            name = "  Lights  "
            serial_port = "/dev/ttyUSB1"
            baud_rate = 115200
            delimiter = "crlf"

            [dispatch]
            optimistic = "on_success"
            refresh_after_write = true

            [web]
            listen = "0.0.0.0:9000"

            [[accessories]]
            id = "a"
            name = "Hall"
            channel = 1

            [[accessories]]
            id = "b"
            name = "Porch"
            channel = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.display_name(), Some("Lights"));
        assert_eq!(
            config.serial_settings(),
            SerialSettings {
                path: "/dev/ttyUSB1".to_string(),
                baud_rate: 115200,
                delimiter: LineDelimiter::CrLf,
            }
        );
        assert_eq!(config.dispatch.optimistic, OptimisticUpdate::OnSuccess);
        assert!(config.dispatch.refresh_after_write);
        assert_eq!(config.web.listen.as_deref(), Some("0.0.0.0:9000"));

        let devices = config.devices();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].name, "Porch");
        assert_eq!(devices[1].channel, Channel(3));
    }

    #[test]
    fn test_accessories_not_a_list() {
        let config = ConfigFile::from_toml(r#"accessories = "oops""#).unwrap();
        assert!(config.devices().is_empty());

        let config = ConfigFile::from_toml("[accessories]\nid = \"a\"").unwrap();
        assert!(config.devices().is_empty());
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let config = ConfigFile::from_toml(
            r#"
            accessories = [
                { id = "ok", name = "Ok", channel = 2 },
                { id = "missing-channel", name = "Bad" },
                { id = "neg", name = "Neg", channel = -1 },
            ]
            "#,
        )
        .unwrap();

        let devices = config.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "ok");
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "port = \"/dev/ttyACM1\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.serial_settings().path, "/dev/ttyACM1");

        let missing = load_config(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
