//! # box-core
//!
//! Core functionality for the box queue service.
//!
//! This crate provides:
//! - Cryptographic primitives (XChaCha20-Poly1305, transcript KDF, key files)
//! - Configuration handling (`boxd.toml`, environment, CLI overlay)
//! - Shared map/list containers, the key/value store and its on-disk archive

pub mod config;
pub mod crypto;
pub mod store;

use box_protocol::BoxError;

// Re-export commonly used types
pub use config::{
    ClientConfig, CommandTransports, ConfigError, LogLevel, LogTarget, NoisePattern,
    ProtocolMode, SecurityConfig, ServerConfig, ServerOverrides, TransportMode,
};
pub use crypto::{constant_time_compare, secure_zero, KdfError, SessionKeys, XChaCha20Poly1305};
pub use store::{QueueArchive, SharedList, SharedMap, Store, StoreError, StoredObject};

impl From<ConfigError> for BoxError {
    fn from(e: ConfigError) -> Self {
        BoxError::Config(e.to_string())
    }
}

impl From<KdfError> for BoxError {
    fn from(e: KdfError) -> Self {
        BoxError::Config(e.to_string())
    }
}

impl From<StoreError> for BoxError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Io(io) => BoxError::Io(io),
            other => BoxError::Fatal(other.to_string()),
        }
    }
}
