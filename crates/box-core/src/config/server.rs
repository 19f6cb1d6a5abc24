//! # Server Configuration
//!
//! Resolved `boxd` settings. Sources are layered lowest to highest:
//! built-in defaults, `boxd.toml`, `BOXD_PORT`, command-line flags.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use box_protocol::STATIC_KEY_SIZE;

use super::common::*;
use super::file::{ConfigFile, KNOWN_KEYS};
use super::security::SecurityConfig;
use crate::crypto::load_key;

/// Environment variable overriding the default port
pub const PORT_ENV: &str = "BOXD_PORT";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_dir: PathBuf,
    pub bind_addr: IpAddr,
    pub port: u16,
    pub log_level: LogLevel,
    pub log_target: LogTarget,
    pub protocol: ProtocolMode,
    pub transport: TransportMode,
    pub command_transports: CommandTransports,
    pub security: SecurityConfig,
    /// Register the UDP socket with epoll/kqueue when available
    pub use_reactor: bool,
    /// Mirror stored objects under `queues/`
    pub persist: bool,
    /// Unrecognised keys found in `boxd.toml`
    pub ignored_keys: Vec<String>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ServerOverrides {
    pub port: Option<u16>,
    pub log_level: Option<LogLevel>,
    pub log_target: Option<LogTarget>,
    pub protocol: Option<ProtocolMode>,
    pub transport: Option<TransportMode>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub pre_share_key_identity: Option<String>,
    pub pre_share_key: Option<String>,
}

impl ServerConfig {
    /// Defaults rooted at `base_dir`
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        ServerConfig {
            base_dir: base_dir.into(),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: default_port(),
            log_level: LogLevel::default(),
            log_target: LogTarget::default(),
            protocol: ProtocolMode::default(),
            transport: TransportMode::default(),
            command_transports: CommandTransports::default(),
            security: SecurityConfig::default(),
            use_reactor: true,
            persist: true,
            ignored_keys: Vec::new(),
        }
    }

    /// Resolve the full configuration
    ///
    /// `base_dir` defaults to `~/.box`; `env_port` is the raw value of
    /// `BOXD_PORT`, consulted only when no `--port` flag was given.
    pub fn load(
        base_dir: Option<PathBuf>,
        env_port: Option<&str>,
        overrides: &ServerOverrides,
    ) -> Result<Self, ConfigError> {
        let base_dir = match base_dir {
            Some(dir) => dir,
            None => default_base_dir()?,
        };
        let mut config = ServerConfig::new(base_dir);

        if let Some(file) = ConfigFile::from_file(config.config_path())? {
            config.apply_file(&file)?;
            config.ignored_keys = file.unknown_keys().map(str::to_string).collect();
        }
        if overrides.port.is_none() {
            if let Some(raw) = env_port {
                config.port = parse_port(raw)?;
            }
        }
        config.apply_overrides(overrides)?;
        Ok(config)
    }

    pub fn apply_file(&mut self, file: &ConfigFile) -> Result<(), ConfigError> {
        if let Some(ref port) = file.port {
            self.port = port.to_port()?;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        if let Some(ref target) = file.log_target {
            self.log_target = target.clone();
        }
        if let Some(protocol) = file.protocol {
            self.protocol = protocol;
        }
        if let Some(transport) = file.transport {
            self.transport = transport;
        }
        self.command_transports = file.command_transports();
        if let Some(ref psk) = file.pre_share_key {
            self.security.set_pre_shared_key(psk)?;
        }
        if let Some(pattern) = file.noise_pattern {
            self.security.pattern = pattern;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ServerOverrides) -> Result<(), ConfigError> {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        if let Some(ref target) = overrides.log_target {
            self.log_target = target.clone();
        }
        if let Some(protocol) = overrides.protocol {
            self.protocol = protocol;
        }
        if let Some(transport) = overrides.transport {
            self.transport = transport;
        }
        if let Some(ref path) = overrides.cert {
            self.security.server_static_public = Some(*read_key(path)?);
        }
        if let Some(ref path) = overrides.key {
            self.security.client_static_private = Some(read_key(path)?);
        }
        if let Some(ref identity) = overrides.pre_share_key_identity {
            self.security.peer_identity = Some(identity.clone());
        }
        if let Some(ref psk) = overrides.pre_share_key {
            self.security.set_pre_shared_key(psk)?;
        }
        Ok(())
    }

    /// Report `ignored_keys`; call once a logger is installed
    pub fn warn_ignored_keys(&self) {
        for key in &self.ignored_keys {
            log::warn!(
                "{}: ignoring unknown key '{}' (known: {})",
                self.config_path().display(),
                key,
                KNOWN_KEYS.join(", ")
            );
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join(default_config_file_name())
    }

    pub fn run_dir(&self) -> PathBuf {
        self.base_dir.join("run")
    }

    pub fn admin_socket_path(&self) -> PathBuf {
        self.run_dir().join(default_socket_name())
    }

    pub fn queues_dir(&self) -> PathBuf {
        self.base_dir.join("queues")
    }

    /// Transport a request for `command` must arrive on
    pub fn required_transport(&self, command: box_protocol::Command) -> TransportMode {
        use box_protocol::Command;
        match command {
            Command::Put => self.command_transports.put_or(self.transport),
            Command::Get | Command::Delete => self.command_transports.get_or(self.transport),
            Command::Status => self.command_transports.status_or(self.transport),
            _ => TransportMode::Clear,
        }
    }
}

fn read_key(path: &Path) -> Result<zeroize::Zeroizing<[u8; STATIC_KEY_SIZE]>, ConfigError> {
    load_key(path).map_err(|e| ConfigError::InvalidKey(format!("{}: {}", path.display(), e)))
}
