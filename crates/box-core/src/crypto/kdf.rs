//! # Key Derivation
//!
//! Transcript-bound session key derivation with BLAKE2b-256.
//!
//! ```text
//! transcript = BLAKE2b-256( "box/noise/scaffold/v1"
//!                         | pattern byte (NK=1, IK=2, other=0)
//!                         | prologue
//!                         | server static public key (if known)
//!                         | client static public key (if known) )
//!
//! session_key = BLAKE2b-256(key = secret, transcript)
//! secret      = pre-shared key, else client static private key under IK
//! ```
//!
//! Both endpoints derive the same key from the same `SecurityConfig`.

use blake2::digest::consts::U32;
use blake2::digest::{Digest, FixedOutput, KeyInit, Update};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use box_protocol::{KEY_SIZE, MAX_SECRET_SIZE, TRANSCRIPT_LABEL};

use crate::config::{NoisePattern, SecurityConfig};

type Blake2b256 = blake2::Blake2b<U32>;
type Blake2b256Mac = blake2::Blake2bMac<U32>;

/// Hash output size (BLAKE2b-256 = 32 bytes)
pub const HASH_SIZE: usize = 32;

/// Error type for KDF operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KdfError {
    /// Secret longer than a BLAKE2b key may be
    #[error("Secret too long: max {max} bytes, got {got}")]
    SecretTooLong { max: usize, got: usize },
}

/// Derived session material
pub struct SessionKeys {
    pub transcript_hash: [u8; HASH_SIZE],
    /// Absent when the config carries no secret; such a session is inert
    pub session_key: Option<Zeroizing<[u8; KEY_SIZE]>>,
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("transcript_hash", &hex(&self.transcript_hash))
            .field("session_key", &self.session_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Hash the handshake parameters into a transcript
pub fn transcript_hash(config: &SecurityConfig) -> [u8; HASH_SIZE] {
    let mut hasher = <Blake2b256 as Digest>::new();
    Digest::update(&mut hasher, TRANSCRIPT_LABEL);
    Digest::update(&mut hasher, [config.pattern.transcript_byte()]);
    Digest::update(&mut hasher, &config.prologue);
    if let Some(ref key) = config.server_static_public {
        Digest::update(&mut hasher, key);
    }
    if let Some(ref key) = config.client_static_public {
        Digest::update(&mut hasher, key);
    }

    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&Digest::finalize(hasher));
    out
}

/// Key the transcript with `secret`
pub fn session_key(
    transcript: &[u8; HASH_SIZE],
    secret: &[u8],
) -> Result<Zeroizing<[u8; KEY_SIZE]>, KdfError> {
    if secret.len() > MAX_SECRET_SIZE {
        return Err(KdfError::SecretTooLong {
            max: MAX_SECRET_SIZE,
            got: secret.len(),
        });
    }

    let mut mac = <Blake2b256Mac as KeyInit>::new_from_slice(secret).map_err(|_| {
        KdfError::SecretTooLong {
            max: MAX_SECRET_SIZE,
            got: secret.len(),
        }
    })?;
    Update::update(&mut mac, transcript);
    let result = mac.finalize_fixed();

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&result);
    Ok(key)
}

/// Secret material selected by the config, if any
pub fn secret_material(config: &SecurityConfig) -> Option<&[u8]> {
    if let Some(ref psk) = config.pre_shared_key {
        if !psk.is_empty() {
            return Some(&psk[..]);
        }
    }
    if config.pattern == NoisePattern::Ik {
        if let Some(ref private) = config.client_static_private {
            return Some(&private[..]);
        }
    }
    None
}

/// Derive transcript hash and (when a secret exists) the session key
pub fn derive(config: &SecurityConfig) -> Result<SessionKeys, KdfError> {
    let transcript = transcript_hash(config);
    let session_key = match secret_material(config) {
        Some(secret) => Some(session_key(&transcript, secret)?),
        None => None,
    };
    Ok(SessionKeys {
        transcript_hash: transcript,
        session_key,
    })
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psk_config(psk: &str) -> SecurityConfig {
        SecurityConfig::default().with_pre_shared_key(psk.as_bytes())
    }

    #[test]
    fn test_both_sides_agree() {
        let a = derive(&psk_config("psk123")).unwrap();
        let b = derive(&psk_config("psk123")).unwrap();
        assert_eq!(a.transcript_hash, b.transcript_hash);
        assert_eq!(*a.session_key.unwrap(), *b.session_key.unwrap());
    }

    #[test]
    fn test_secret_changes_key() {
        let a = derive(&psk_config("psk123")).unwrap();
        let b = derive(&psk_config("psk124")).unwrap();
        assert_eq!(a.transcript_hash, b.transcript_hash);
        assert_ne!(*a.session_key.unwrap(), *b.session_key.unwrap());
    }

    #[test]
    fn test_transcript_binds_parameters() {
        let base = psk_config("k");
        let nk = transcript_hash(&base.clone().with_pattern(NoisePattern::Nk));
        let ik = transcript_hash(&base.clone().with_pattern(NoisePattern::Ik));
        let unknown = transcript_hash(&base.clone().with_pattern(NoisePattern::Unknown));
        assert_ne!(nk, ik);
        assert_ne!(nk, unknown);

        let with_prologue = transcript_hash(&base.clone().with_prologue(b"box"));
        assert_ne!(with_prologue, transcript_hash(&base));

        let with_server = transcript_hash(&base.clone().with_server_static_public([1u8; 32]));
        assert_ne!(with_server, transcript_hash(&base));
    }

    #[test]
    fn test_transcript_matches_manual_hash() {
        let cfg = SecurityConfig::default()
            .with_pattern(NoisePattern::Nk)
            .with_prologue(b"p");
        let mut hasher = <Blake2b256 as Digest>::new();
        Digest::update(&mut hasher, b"box/noise/scaffold/v1");
        Digest::update(&mut hasher, [0x01u8]);
        Digest::update(&mut hasher, b"p");
        let expected = Digest::finalize(hasher);
        assert_eq!(&transcript_hash(&cfg)[..], &expected[..]);
    }

    #[test]
    fn test_no_secret_is_inert() {
        let keys = derive(&SecurityConfig::default()).unwrap();
        assert!(keys.session_key.is_none());

        let empty = derive(&psk_config("")).unwrap();
        assert!(empty.session_key.is_none());
    }

    #[test]
    fn test_ik_uses_client_private() {
        let cfg = SecurityConfig::default()
            .with_pattern(NoisePattern::Ik)
            .with_client_static_private([4u8; 32]);
        assert!(derive(&cfg).unwrap().session_key.is_some());

        let nk = cfg.clone().with_pattern(NoisePattern::Nk);
        assert!(derive(&nk).unwrap().session_key.is_none());
    }

    #[test]
    fn test_psk_preferred_over_private() {
        let with_both = SecurityConfig::default()
            .with_pattern(NoisePattern::Ik)
            .with_client_static_private([4u8; 32])
            .with_pre_shared_key(b"shared");
        let psk_only = SecurityConfig::default()
            .with_pattern(NoisePattern::Ik)
            .with_pre_shared_key(b"shared");
        assert_eq!(
            *derive(&with_both).unwrap().session_key.unwrap(),
            *derive(&psk_only).unwrap().session_key.unwrap()
        );
    }

    #[test]
    fn test_secret_too_long() {
        let long = vec![b'x'; 65];
        let cfg = SecurityConfig::default().with_pre_shared_key(&long);
        assert_eq!(
            derive(&cfg).unwrap_err(),
            KdfError::SecretTooLong { max: 64, got: 65 }
        );
    }
}
