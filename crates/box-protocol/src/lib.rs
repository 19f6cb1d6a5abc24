//! # box-protocol
//!
//! Protocol types and definitions for the box queue service.
//!
//! This crate provides:
//! - Protocol constants (framing, sizes, limits)
//! - Error types for all box operations
//! - V1 frame and payload codecs
//! - Secure frame layout and replay protection

mod constants;
mod error;
mod replay;
pub mod payload;
pub mod secure;
pub mod v1;

pub use constants::*;
pub use error::{
    BoxError, CryptoError, ErrorKind, ProtocolError, Result, RunloopError, TransportError,
};
pub use payload::{HelloPayload, Payload, PutPayload, QueuePayload, StatusPayload};
pub use replay::ReplayWindow;
pub use secure::{build_nonce, is_secure_frame, SecureFrame};
pub use v1::{looks_like_v1, Command, StatusCode, V1Frame};
