//! Session identifiers.
//!
//! A presenter's session is addressed by two unrelated identifiers: the
//! remote id (control channel, remote controllers) and the multiplex id
//! (mirroring channel, followers). They are kept as distinct types so one can
//! never be used to address the other's audience.

use std::fmt;

use podium_auth::{ResumptionHash, SessionSecret, compute_hash, verify};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! session_id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a client-supplied identifier. Empty strings are rejected.
            pub fn new(id: impl Into<String>) -> Option<Self> {
                let id = id.into();
                if id.is_empty() { None } else { Some(Self(id)) }
            }

            /// Fresh random (UUID v4) identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

session_id_type!(RemoteId);
session_id_type!(MultiplexId);

/// Identifiers a presenter holds for the lifetime of its connection, plus the
/// hash that lets it reclaim them later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIds {
    pub remote_id: RemoteId,
    pub multiplex_id: MultiplexId,
    pub hash: ResumptionHash,
}

impl SessionIds {
    /// Bind a freshly minted pair to this server's secret.
    pub fn issue(remote_id: RemoteId, multiplex_id: MultiplexId, secret: &SessionSecret) -> Self {
        let hash = compute_hash(remote_id.as_str(), multiplex_id.as_str(), secret);
        Self {
            remote_id,
            multiplex_id,
            hash,
        }
    }

    /// Accept a previously issued triple, or `None` if the hash does not
    /// verify under `secret`.
    pub fn resume(
        remote_id: &str,
        multiplex_id: &str,
        claimed_hash: &str,
        secret: &SessionSecret,
    ) -> Option<Self> {
        if !verify(remote_id, multiplex_id, claimed_hash, secret) {
            return None;
        }
        let hash = claimed_hash.parse().ok()?;
        Some(Self {
            remote_id: RemoteId::new(remote_id)?,
            multiplex_id: MultiplexId::new(multiplex_id)?,
            hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SessionSecret {
        SessionSecret::new("session-test").unwrap()
    }

    #[test]
    fn empty_ids_rejected() {
        assert!(RemoteId::new("").is_none());
        assert!(MultiplexId::new(String::new()).is_none());
        assert_eq!(RemoteId::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn generated_ids_are_uuids() {
        let id = RemoteId::generate();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
        assert_ne!(RemoteId::generate(), id);
    }

    #[test]
    fn issued_ids_resume() {
        let ids = SessionIds::issue(RemoteId::generate(), MultiplexId::generate(), &secret());
        let resumed = SessionIds::resume(
            ids.remote_id.as_str(),
            ids.multiplex_id.as_str(),
            &ids.hash.to_string(),
            &secret(),
        )
        .unwrap();
        assert_eq!(resumed, ids);
    }

    #[test]
    fn resume_rejects_foreign_secret() {
        let ids = SessionIds::issue(RemoteId::generate(), MultiplexId::generate(), &secret());
        let other = SessionSecret::new("another").unwrap();
        assert!(
            SessionIds::resume(
                ids.remote_id.as_str(),
                ids.multiplex_id.as_str(),
                &ids.hash.to_string(),
                &other,
            )
            .is_none()
        );
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = RemoteId::new("r-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"r-1\"");
    }
}
