//! Session secret and resumption fingerprint primitives for Podium.

pub mod encoding;
pub mod error;
pub mod resumption;
pub mod secret;

pub use error::AuthError;
pub use resumption::{ResumptionHash, compute_hash, verify};
pub use secret::SessionSecret;
