//! Error taxonomy for trust-chain bootstrap.
//!
//! Every certificate operation in this crate returns [`PkiError`]. Nothing is
//! caught and suppressed on the way up: a failure in any step reaches the
//! caller of [`crate::bootstrap::ensure_trust_chain`], which is expected to
//! abort process startup.

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PkiError {
    /// RSA key generation failed, or the requested key size is not allowed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// PEM block missing, malformed, or of the wrong type
    #[error("failed to decode PEM: {0}")]
    Decode(String),

    /// DER payload is not a well-formed X.509 certificate or request
    #[error("failed to parse X.509 structure: {0}")]
    Parse(String),

    /// Certificate or request construction/signing failed
    #[error("failed to sign: {0}")]
    Sign(String),

    /// Reused artifacts do not belong to the same chain
    #[error("inconsistent trust chain: {0}")]
    Inconsistent(String),

    /// The assembled chain was rejected by the TLS stack
    #[error("TLS configuration rejected the chain: {0}")]
    Tls(String),
}

impl PkiError {
    pub(crate) fn key_generation(context: &str, err: impl Display) -> Self {
        PkiError::KeyGeneration(format!("{context}: {err}"))
    }

    pub(crate) fn decode(context: &str, err: impl Display) -> Self {
        PkiError::Decode(format!("{context}: {err}"))
    }

    pub(crate) fn parse(context: &str, err: impl Display) -> Self {
        PkiError::Parse(format!("{context}: {err}"))
    }

    pub(crate) fn sign(context: &str, err: impl Display) -> Self {
        PkiError::Sign(format!("{context}: {err}"))
    }

    pub(crate) fn tls(context: &str, err: impl Display) -> Self {
        PkiError::Tls(format!("{context}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, PkiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_prefixed() {
        let err = PkiError::sign("Failed to set version", "boom");
        assert_eq!(err.to_string(), "failed to sign: Failed to set version: boom");
    }
}
