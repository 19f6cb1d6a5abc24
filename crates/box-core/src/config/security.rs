//! # Security Configuration
//!
//! Inputs to session-key derivation. Built once per connection and not
//! changed afterwards.

use std::fmt;
use zeroize::Zeroizing;

use box_protocol::{MAX_SECRET_SIZE, STATIC_KEY_SIZE};

use super::common::{ConfigError, NoisePattern};

#[derive(Clone, Default)]
pub struct SecurityConfig {
    /// Empty keys are treated as absent
    pub pre_shared_key: Option<Zeroizing<Vec<u8>>>,
    pub server_static_public: Option<[u8; STATIC_KEY_SIZE]>,
    pub client_static_public: Option<[u8; STATIC_KEY_SIZE]>,
    /// Secret material for IK when no pre-shared key is set
    pub client_static_private: Option<Zeroizing<[u8; STATIC_KEY_SIZE]>>,
    pub pattern: NoisePattern,
    pub prologue: Vec<u8>,
    /// Expected identity of the pre-shared key holder
    pub peer_identity: Option<String>,
}

impl SecurityConfig {
    pub fn with_pre_shared_key(mut self, psk: &[u8]) -> Self {
        self.pre_shared_key = Some(Zeroizing::new(psk.to_vec()));
        self
    }

    /// Set the pre-shared key from its ASCII form
    ///
    /// An empty string clears the key.
    pub fn set_pre_shared_key(&mut self, psk: &str) -> Result<(), ConfigError> {
        if psk.len() > MAX_SECRET_SIZE {
            return Err(ConfigError::SecretTooLong {
                max: MAX_SECRET_SIZE,
                got: psk.len(),
            });
        }
        self.pre_shared_key = if psk.is_empty() {
            None
        } else {
            Some(Zeroizing::new(psk.as_bytes().to_vec()))
        };
        Ok(())
    }

    pub fn with_pattern(mut self, pattern: NoisePattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_prologue(mut self, prologue: &[u8]) -> Self {
        self.prologue = prologue.to_vec();
        self
    }

    pub fn with_server_static_public(mut self, key: [u8; STATIC_KEY_SIZE]) -> Self {
        self.server_static_public = Some(key);
        self
    }

    pub fn with_client_static_public(mut self, key: [u8; STATIC_KEY_SIZE]) -> Self {
        self.client_static_public = Some(key);
        self
    }

    pub fn with_client_static_private(mut self, key: [u8; STATIC_KEY_SIZE]) -> Self {
        self.client_static_private = Some(Zeroizing::new(key));
        self
    }

    pub fn with_peer_identity(mut self, identity: &str) -> Self {
        self.peer_identity = Some(identity.to_string());
        self
    }

    /// True when a session key can be derived
    pub fn has_secret(&self) -> bool {
        let psk = self
            .pre_shared_key
            .as_ref()
            .map(|k| !k.is_empty())
            .unwrap_or(false);
        psk || (self.pattern == NoisePattern::Ik && self.client_static_private.is_some())
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field(
                "pre_shared_key",
                &self.pre_shared_key.as_ref().map(|_| "<redacted>"),
            )
            .field("server_static_public", &self.server_static_public.is_some())
            .field("client_static_public", &self.client_static_public.is_some())
            .field(
                "client_static_private",
                &self.client_static_private.as_ref().map(|_| "<redacted>"),
            )
            .field("pattern", &self.pattern)
            .field("prologue_len", &self.prologue.len())
            .field("peer_identity", &self.peer_identity)
            .finish()
    }
}
