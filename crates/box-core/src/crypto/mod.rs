//! # Cryptographic Module
//!
//! Primitives used by the secure transport:
//!
//! - XChaCha20-Poly1305 AEAD (IETF)
//! - BLAKE2b-256 transcript hashing and keyed session-key derivation
//! - Static key file loading
//! - Constant-time and memory hygiene helpers

mod aead;
mod util;

pub mod kdf;
pub mod keyfile;

pub use aead::{decrypt, encrypt, XChaCha20Poly1305};
pub use kdf::{derive, transcript_hash, KdfError, SessionKeys};
pub use keyfile::{load_key, parse_key, KeyFileError};
pub use util::{constant_time_compare, fill_random, random_array, secure_zero};
