//! Error types for secret and fingerprint parsing.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid resumption hash: {0}")]
    InvalidHash(String),

    #[error("session secret must not be empty")]
    EmptySecret,
}

impl AuthError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidHash(_) => "invalid_hash",
            Self::EmptySecret => "empty_secret",
        }
    }
}
