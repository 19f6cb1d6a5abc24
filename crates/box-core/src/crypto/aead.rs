//! # XChaCha20-Poly1305 AEAD
//!
//! IETF XChaCha20-Poly1305 using RustCrypto. 24-byte nonces, 16-byte tags.

use chacha20poly1305::{
    aead::{Aead, AeadInPlace, KeyInit, Payload},
    Key, Tag, XChaCha20Poly1305 as XChaChaCipher, XNonce,
};

use box_protocol::{CryptoError, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

use super::util::secure_zero;

type Result<T> = std::result::Result<T, CryptoError>;

/// XChaCha20-Poly1305 AEAD cipher (RustCrypto implementation)
pub struct XChaCha20Poly1305 {
    cipher: XChaChaCipher,
}

impl XChaCha20Poly1305 {
    /// Create new XChaCha20-Poly1305 instance
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        XChaCha20Poly1305 {
            cipher: XChaChaCipher::new(Key::from_slice(key)),
        }
    }

    /// Encrypt with authentication
    pub fn encrypt(&self, nonce: &[u8; NONCE_SIZE], ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let payload = Payload { msg: plaintext, aad: ad };
        self.cipher
            .encrypt(XNonce::from_slice(nonce), payload)
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Decrypt and verify
    pub fn decrypt(&self, nonce: &[u8; NONCE_SIZE], ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::CiphertextTooShort(ciphertext.len()));
        }
        let payload = Payload { msg: ciphertext, aad: ad };
        self.cipher
            .decrypt(XNonce::from_slice(nonce), payload)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Encrypt into `out`, returning `plaintext.len() + TAG_SIZE`
    pub fn encrypt_into(
        &self,
        nonce: &[u8; NONCE_SIZE],
        ad: &[u8],
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        let len = plaintext.len();
        let needed = len + TAG_SIZE;
        if out.len() < needed {
            return Err(CryptoError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        out[..len].copy_from_slice(plaintext);
        let tag = self
            .cipher
            .encrypt_in_place_detached(XNonce::from_slice(nonce), ad, &mut out[..len])
            .map_err(|_| CryptoError::EncryptionFailed)?;
        out[len..needed].copy_from_slice(&tag);
        Ok(needed)
    }

    /// Decrypt into `out`, returning `ciphertext.len() - TAG_SIZE`
    pub fn decrypt_into(
        &self,
        nonce: &[u8; NONCE_SIZE],
        ad: &[u8],
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::CiphertextTooShort(ciphertext.len()));
        }
        let len = ciphertext.len() - TAG_SIZE;
        if out.len() < len {
            return Err(CryptoError::BufferTooSmall {
                needed: len,
                available: out.len(),
            });
        }

        out[..len].copy_from_slice(&ciphertext[..len]);
        let tag = Tag::from_slice(&ciphertext[len..]);
        if self
            .cipher
            .decrypt_in_place_detached(XNonce::from_slice(nonce), ad, &mut out[..len], tag)
            .is_err()
        {
            secure_zero(&mut out[..len]);
            return Err(CryptoError::AuthenticationFailed);
        }
        Ok(len)
    }
}

/// One-shot encrypt
pub fn encrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    XChaCha20Poly1305::new(key).encrypt(nonce, ad, plaintext)
}

/// One-shot decrypt
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    XChaCha20Poly1305::new(key).decrypt(nonce, ad, ciphertext)
}
