//! # Client Configuration

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use super::common::*;
use super::security::SecurityConfig;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub transport: TransportMode,
    pub command_transports: CommandTransports,
    pub security: SecurityConfig,
    /// Per-reply receive timeout
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: default_port(),
            transport: TransportMode::Clear,
            command_transports: CommandTransports::default(),
            security: SecurityConfig::default(),
            timeout: Duration::from_millis(default_timeout_ms()),
        }
    }
}

impl ClientConfig {
    pub fn new(host: &str, port: u16) -> Self {
        ClientConfig {
            host: host.to_string(),
            port,
            ..Default::default()
        }
    }

    /// Resolve `host:port`, preferring IPv4
    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| ConfigError::invalid("host", &self.host))?
            .collect();
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| ConfigError::invalid("host", &self.host))
    }

    pub fn put_transport(&self) -> TransportMode {
        self.command_transports.put_or(self.transport)
    }

    pub fn get_transport(&self) -> TransportMode {
        self.command_transports.get_or(self.transport)
    }

    pub fn status_transport(&self) -> TransportMode {
        self.command_transports.status_or(self.transport)
    }

    /// Whether any command needs a secure session
    pub fn needs_session(&self) -> bool {
        [
            self.put_transport(),
            self.get_transport(),
            self.status_transport(),
        ]
        .contains(&TransportMode::Noise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_addr() {
        let cfg = ClientConfig::new("127.0.0.1", 4000);
        assert_eq!(cfg.server_addr().unwrap(), "127.0.0.1:4000".parse().unwrap());
        assert!(ClientConfig::new("not a host", 1).server_addr().is_err());
    }

    #[test]
    fn test_transport_selection() {
        let mut cfg = ClientConfig::default();
        assert!(!cfg.needs_session());
        cfg.command_transports.put = Some(TransportMode::Noise);
        assert!(cfg.needs_session());
        assert_eq!(cfg.put_transport(), TransportMode::Noise);
        assert_eq!(cfg.get_transport(), TransportMode::Clear);
    }
}
