//! # Error Module
//!
//! Unified error handling for the box service.

use std::io;
use thiserror::Error;

/// Top-level error for every box operation
#[derive(Debug, Error)]
pub enum BoxError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Runloop error: {0}")]
    Runloop(#[from] RunloopError),
    #[error("Fatal: {0}")]
    Fatal(String),
}

/// Malformed v1 frames and payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame too short: need {min} bytes, got {got}")]
    TooShort { min: usize, got: usize },
    #[error("bad magic byte 0x{0:02x}")]
    BadMagic(u8),
    #[error("unsupported frame version 0x{0:02x}")]
    BadVersion(u8),
    #[error("truncated frame: declared {declared} bytes, got {got}")]
    Truncated { declared: usize, got: usize },
    #[error("destination buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("malformed {0} payload")]
    MalformedPayload(&'static str),
    #[error("unknown status code {0}")]
    UnknownStatus(u8),
}

/// Secure transport failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("session has no key")]
    NoSessionKey,
    #[error("frame too large: {size} bytes exceeds {max}")]
    FrameTooLarge { size: usize, max: usize },
    #[error("bad secure frame header")]
    BadHeader,
    #[error("peer salt mismatch")]
    SaltMismatch,
    #[error("counter {counter} too old for window ending at {max}")]
    TooOld { counter: u64, max: u64 },
    #[error("counter {0} replayed")]
    Replayed(u64),
    #[error("AEAD authentication failed")]
    AeadFailure,
    #[error("datagram from unexpected peer")]
    UnexpectedPeer,
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// True for failures that indicate a replayed or stale counter
    pub fn is_replay(&self) -> bool {
        matches!(self, TransportError::Replayed(_) | TransportError::TooOld { .. })
    }
}

/// AEAD primitive failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("ciphertext shorter than tag: {0} bytes")]
    CiphertextTooShort(usize),
    #[error("output buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Runloop posting and reactor failures
#[derive(Debug, Error)]
pub enum RunloopError {
    #[error("queue full")]
    QueueFull,
    #[error("runloop stopped")]
    Stopped,
    #[error("no reactor backend on this platform")]
    ReactorUnavailable,
    #[error("reactor I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error classes used for propagation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Io,
    Protocol,
    Crypto,
    Resource,
    Fatal,
}

impl BoxError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoxError::Io(_) => ErrorKind::Io,
            BoxError::Config(_) => ErrorKind::Configuration,
            BoxError::Protocol(_) => ErrorKind::Protocol,
            BoxError::Transport(e) => match e {
                TransportError::Io(_) => ErrorKind::Io,
                TransportError::FrameTooLarge { .. } => ErrorKind::Resource,
                TransportError::NoSessionKey => ErrorKind::Configuration,
                _ => ErrorKind::Crypto,
            },
            BoxError::Crypto(_) => ErrorKind::Crypto,
            BoxError::Runloop(e) => match e {
                RunloopError::Io(_) => ErrorKind::Io,
                _ => ErrorKind::Resource,
            },
            BoxError::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, BoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let e: BoxError = TransportError::Replayed(3).into();
        assert_eq!(e.kind(), ErrorKind::Crypto);

        let e: BoxError = RunloopError::QueueFull.into();
        assert_eq!(e.kind(), ErrorKind::Resource);

        let e: BoxError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert_eq!(e.kind(), ErrorKind::Io);

        let e = BoxError::Config("bad port".into());
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_replay_class() {
        assert!(TransportError::Replayed(1).is_replay());
        assert!(TransportError::TooOld { counter: 1, max: 100 }.is_replay());
        assert!(!TransportError::AeadFailure.is_replay());
    }
}
