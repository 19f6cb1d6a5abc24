//! # Secure Frame Layout
//!
//! Each secure datagram is:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────┬─────────────────────┐
//! │ "NZ" 01 00   │ Nonce: salt(16) | counter(8, be) │ Ciphertext + tag    │
//! │ (4)          │ (24)                             │ (plaintext + 16)    │
//! └──────────────┴──────────────────────────────────┴─────────────────────┘
//! ```
//!
//! The 4-byte header is the AEAD associated data.

use crate::constants::{
    COUNTER_SIZE, NONCE_SIZE, SALT_SIZE, SECURE_HEADER, SECURE_HEADER_MATCH, SECURE_HEADER_SIZE,
    SECURE_MAX_FRAME, SECURE_MIN_FRAME,
};
use crate::error::TransportError;

/// Build a nonce from a session salt and a send counter
#[inline]
pub fn build_nonce(salt: &[u8; SALT_SIZE], counter: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..SALT_SIZE].copy_from_slice(salt);
    nonce[SALT_SIZE..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// Borrowed view of a received secure frame
#[derive(Debug, Clone, Copy)]
pub struct SecureFrame<'a> {
    pub header: &'a [u8],
    pub nonce: &'a [u8; NONCE_SIZE],
    pub ciphertext: &'a [u8],
}

impl<'a> SecureFrame<'a> {
    /// Split a datagram into header, nonce and ciphertext
    pub fn parse(datagram: &'a [u8]) -> Result<Self, TransportError> {
        if !is_secure_frame(datagram) {
            return Err(TransportError::BadHeader);
        }
        let (header, rest) = datagram.split_at(SECURE_HEADER_SIZE);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
        let nonce: &[u8; NONCE_SIZE] = nonce.try_into().map_err(|_| TransportError::BadHeader)?;
        Ok(SecureFrame {
            header,
            nonce,
            ciphertext,
        })
    }

    /// Sender's salt
    #[inline]
    pub fn salt(&self) -> [u8; SALT_SIZE] {
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&self.nonce[..SALT_SIZE]);
        salt
    }

    /// Sender's counter
    #[inline]
    pub fn counter(&self) -> u64 {
        let mut counter = [0u8; COUNTER_SIZE];
        counter.copy_from_slice(&self.nonce[SALT_SIZE..]);
        u64::from_be_bytes(counter)
    }
}

/// True when the datagram is long enough and starts with "NZ" 0x01
#[inline]
pub fn is_secure_frame(datagram: &[u8]) -> bool {
    datagram.len() >= SECURE_MIN_FRAME
        && datagram[..SECURE_HEADER_MATCH] == SECURE_HEADER[..SECURE_HEADER_MATCH]
}

/// Frame size for a plaintext of `len` bytes, if it fits
#[inline]
pub fn frame_len(plaintext_len: usize) -> Result<usize, TransportError> {
    let size = SECURE_MIN_FRAME + plaintext_len;
    if size > SECURE_MAX_FRAME {
        return Err(TransportError::FrameTooLarge {
            size,
            max: SECURE_MAX_FRAME,
        });
    }
    Ok(size)
}
