//! # Common Configuration Types
//!
//! Mode enums shared by server and client configuration, default values,
//! and the configuration error type.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use box_protocol::DEFAULT_PORT;

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter string understood by `env_logger`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::invalid("log_level", s)),
        }
    }
}

/// Where log records go
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum LogTarget {
    #[default]
    Stderr,
    Syslog,
    OsLog,
    EventLog,
    File(PathBuf),
}

impl fmt::Display for LogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTarget::Stderr => write!(f, "stderr"),
            LogTarget::Syslog => write!(f, "syslog"),
            LogTarget::OsLog => write!(f, "oslog"),
            LogTarget::EventLog => write!(f, "eventlog"),
            LogTarget::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

impl FromStr for LogTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(path) = trimmed.strip_prefix("file:") {
            if path.is_empty() {
                return Err(ConfigError::invalid("log_target", s));
            }
            return Ok(LogTarget::File(PathBuf::from(path)));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "stderr" => Ok(LogTarget::Stderr),
            "syslog" => Ok(LogTarget::Syslog),
            "oslog" => Ok(LogTarget::OsLog),
            "eventlog" => Ok(LogTarget::EventLog),
            _ => Err(ConfigError::invalid("log_target", s)),
        }
    }
}

impl TryFrom<String> for LogTarget {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Application protocol spoken above the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMode {
    /// Echo datagrams back without decoding
    Simple,
    #[default]
    V1,
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolMode::Simple => write!(f, "simple"),
            ProtocolMode::V1 => write!(f, "v1"),
        }
    }
}

impl FromStr for ProtocolMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ProtocolMode::Simple),
            "v1" => Ok(ProtocolMode::V1),
            _ => Err(ConfigError::invalid("protocol", s)),
        }
    }
}

/// Datagram transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Clear,
    Noise,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Clear => write!(f, "clear"),
            TransportMode::Noise => write!(f, "noise"),
        }
    }
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(TransportMode::Clear),
            "noise" => Ok(TransportMode::Noise),
            _ => Err(ConfigError::invalid("transport", s)),
        }
    }
}

/// Handshake pattern tag mixed into the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(from = "String")]
pub enum NoisePattern {
    #[default]
    Nk,
    Ik,
    Unknown,
}

impl NoisePattern {
    /// Byte hashed into the transcript
    #[inline]
    pub fn transcript_byte(&self) -> u8 {
        match self {
            NoisePattern::Nk => 0x01,
            NoisePattern::Ik => 0x02,
            NoisePattern::Unknown => 0x00,
        }
    }
}

impl fmt::Display for NoisePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoisePattern::Nk => write!(f, "NK"),
            NoisePattern::Ik => write!(f, "IK"),
            NoisePattern::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for NoisePattern {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "NK" => NoisePattern::Nk,
            "IK" => NoisePattern::Ik,
            _ => NoisePattern::Unknown,
        })
    }
}

impl From<String> for NoisePattern {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(pattern) => pattern,
            Err(never) => match never {},
        }
    }
}

/// Transport to use per command; `None` inherits the global transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandTransports {
    pub put: Option<TransportMode>,
    pub get: Option<TransportMode>,
    pub status: Option<TransportMode>,
}

impl CommandTransports {
    pub fn put_or(&self, fallback: TransportMode) -> TransportMode {
        self.put.unwrap_or(fallback)
    }

    pub fn get_or(&self, fallback: TransportMode) -> TransportMode {
        self.get.unwrap_or(fallback)
    }

    pub fn status_or(&self, fallback: TransportMode) -> TransportMode {
        self.status.unwrap_or(fallback)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT VALUES
// ═══════════════════════════════════════════════════════════════════════════

pub fn default_port() -> u16 {
    DEFAULT_PORT
}
pub fn default_base_dir_name() -> &'static str {
    ".box"
}
pub fn default_config_file_name() -> &'static str {
    "boxd.toml"
}
pub fn default_socket_name() -> &'static str {
    "boxd.socket"
}
pub fn default_timeout_ms() -> u64 {
    2000
}

/// `~/.box`
pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(default_base_dir_name()))
        .ok_or(ConfigError::NoHomeDir)
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Invalid port {0:?}: must be a number in 1..=65535")]
    InvalidPort(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Pre-shared key is {got} bytes, at most {max} allowed")]
    SecretTooLong { max: usize, got: usize },
    #[error("Cannot determine home directory")]
    NoHomeDir,
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: &str) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// UTILITIES
// ═══════════════════════════════════════════════════════════════════════════

/// Parse a port in `(0, 65536)`
pub fn parse_port(s: &str) -> Result<u16, ConfigError> {
    match s.trim().parse::<u32>() {
        Ok(port) if port > 0 && port < 65536 => Ok(port as u16),
        _ => Err(ConfigError::InvalidPort(s.to_string())),
    }
}
