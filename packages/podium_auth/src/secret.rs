//! The server-held secret that keys resumption fingerprints.

use std::fmt;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::encoding::hex_encode;
use crate::error::AuthError;

/// Secret shared by every server instance that should accept each other's
/// resumption hashes. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(String);

impl SessionSecret {
    pub fn new(secret: impl Into<String>) -> Result<Self, AuthError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        Ok(Self(secret))
    }

    /// 32 random bytes, hex-encoded. Hashes issued under a generated secret
    /// stop verifying once the process exits.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex_encode(&bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Short, non-reversible tag for log lines: the first 8 hex chars of
    /// SHA-256(secret).
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex_encode(&digest[..4])
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionSecret({})", self.fingerprint())
    }
}
