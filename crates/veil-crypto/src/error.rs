//! Error taxonomy for the cryptographic envelope.

use thiserror::Error;

/// Result type alias for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Cryptographic operation errors.
///
/// `Decryption` carries no detail about the cause.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Malformed key container, wrong container kind, or invalid key material.
    #[error("{0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// AEAD authentication failed.
    #[error("decryption failed")]
    Decryption,

    /// Authentic bytes did not inflate or deserialize.
    #[error("decoding failed: {0}")]
    Decoding(String),
}

impl CryptoError {
    pub(crate) fn invalid_private_key() -> Self {
        Self::InvalidKey("Invalid private key".to_string())
    }

    pub(crate) fn invalid_public_key() -> Self {
        Self::InvalidKey("Invalid public key".to_string())
    }

    pub(crate) fn decoding(msg: impl std::fmt::Display) -> Self {
        Self::Decoding(msg.to_string())
    }
}
