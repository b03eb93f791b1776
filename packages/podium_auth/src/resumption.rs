//! Resumption fingerprints.
//!
//! A presenter that reloads its page presents the `(remote_id, multiplex_id,
//! hash)` triple it was issued. The server recomputes the hash under its own
//! secret and only then hands the identifiers back, so join links and QR codes
//! that were already shared keep working.
//!
//! The digest input is length-prefixed: each field is preceded by its byte
//! length as a big-endian u64. Two different `(remote_id, multiplex_id)` pairs
//! can therefore never produce the same input, whatever characters they use.
//!
//! Hashes never expire. They stay valid as long as the secret does.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::encoding::{hex_decode, hex_encode};
use crate::error::AuthError;
use crate::secret::SessionSecret;

/// SHA-256 fingerprint binding a session's identifiers to the server secret.
/// Serialized as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResumptionHash([u8; 32]);

impl ResumptionHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Comparison whose running time does not depend on where the first
    /// differing byte is.
    pub fn ct_eq(&self, other: &Self) -> bool {
        let diff = self
            .0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        std::hint::black_box(diff) == 0
    }
}

impl fmt::Display for ResumptionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_encode(&self.0))
    }
}

impl fmt::Debug for ResumptionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResumptionHash({self})")
    }
}

impl FromStr for ResumptionHash {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(AuthError::InvalidHash(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let bytes = hex_decode(s).map_err(|e| AuthError::InvalidHash(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AuthError::InvalidHash("wrong digest length".into()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ResumptionHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ResumptionHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn update_field(hasher: &mut Sha256, field: &[u8]) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field);
}

/// Derive the fingerprint for a pair of session identifiers.
pub fn compute_hash(remote_id: &str, multiplex_id: &str, secret: &SessionSecret) -> ResumptionHash {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, remote_id.as_bytes());
    update_field(&mut hasher, multiplex_id.as_bytes());
    update_field(&mut hasher, secret.as_bytes());
    ResumptionHash(hasher.finalize().into())
}

/// Check a client-supplied hash against the one this server would issue.
/// Text that is not a well-formed hash simply fails verification.
pub fn verify(
    remote_id: &str,
    multiplex_id: &str,
    claimed_hash: &str,
    secret: &SessionSecret,
) -> bool {
    let Ok(claimed) = claimed_hash.parse::<ResumptionHash>() else {
        return false;
    };
    compute_hash(remote_id, multiplex_id, secret).ct_eq(&claimed)
}
