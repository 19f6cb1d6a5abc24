//! # Config File
//!
//! Flat `key = value` TOML document at `~/.box/boxd.toml`. Every key is
//! optional; keys this version does not know are collected and skipped.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use super::common::*;

/// Recognised keys
pub const KNOWN_KEYS: &[&str] = &[
    "port",
    "log_level",
    "log_target",
    "protocol",
    "transport",
    "transport_put",
    "transport_get",
    "transport_status",
    "pre_share_key",
    "noise_pattern",
];

/// `port = 12567` and `port = "12567"` are both accepted
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Text(String),
}

impl PortValue {
    pub fn to_port(&self) -> Result<u16, ConfigError> {
        match self {
            PortValue::Number(n) if *n > 0 && *n < 65536 => Ok(*n as u16),
            PortValue::Number(n) => Err(ConfigError::InvalidPort(n.to_string())),
            PortValue::Text(s) => parse_port(s),
        }
    }
}

/// Parsed `boxd.toml`
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub port: Option<PortValue>,
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    #[serde(default)]
    pub log_target: Option<LogTarget>,
    #[serde(default)]
    pub protocol: Option<ProtocolMode>,
    #[serde(default)]
    pub transport: Option<TransportMode>,
    #[serde(default)]
    pub transport_put: Option<TransportMode>,
    #[serde(default)]
    pub transport_get: Option<TransportMode>,
    #[serde(default)]
    pub transport_status: Option<TransportMode>,
    #[serde(default)]
    pub pre_share_key: Option<String>,
    #[serde(default)]
    pub noise_pattern: Option<NoisePattern>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

impl ConfigFile {
    /// Read `path`; a missing file yields `None`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Some(Self::parse(&content)?))
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Keys present in the file that are not recognised
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.unknown.keys().map(String::as_str)
    }

    /// Per-command transport overrides
    pub fn command_transports(&self) -> CommandTransports {
        CommandTransports {
            put: self.transport_put,
            get: self.transport_get,
            status: self.transport_status,
        }
    }
}

/// Generate example config
pub fn example_config() -> &'static str {
    r#"# box server configuration
# Location: ~/.box/boxd.toml. Command-line flags override these values.

port = 12567
log_level = "info"
# stderr | syslog | oslog | eventlog | file:/path/to/boxd.log
log_target = "stderr"

# simple | v1
protocol = "v1"

# clear | noise
transport = "clear"
# transport_put = "noise"
# transport_get = "noise"
# transport_status = "clear"

# pre_share_key = "change-me"
noise_pattern = "NK"
"#
}
