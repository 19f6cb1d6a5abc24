//! # Configuration Module
//!
//! Server and client settings: `boxd.toml`, environment and command-line
//! overlays, and the security inputs to key derivation.

mod client;
mod common;
mod file;
mod security;
mod server;

pub use client::ClientConfig;
pub use common::{
    default_base_dir, default_port, default_timeout_ms, parse_port, CommandTransports,
    ConfigError, LogLevel, LogTarget, NoisePattern, ProtocolMode, TransportMode,
};
pub use file::{example_config, ConfigFile, PortValue, KNOWN_KEYS};
pub use security::SecurityConfig;
pub use server::{ServerConfig, ServerOverrides, PORT_ENV};
