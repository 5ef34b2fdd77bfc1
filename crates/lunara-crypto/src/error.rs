//! Error types for cryptographic operations.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Envelope version tag not understood by this build.
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(String),

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed - wrong key, tampered data or malformed envelope.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Envelope field is not valid hex or has the wrong length.
    #[error("Invalid envelope field {field}: {message}")]
    InvalidEnvelope { field: &'static str, message: String },

    /// Invalid wallet address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for lunara_core::Error {
    fn from(e: CryptoError) -> Self {
        use lunara_core::Error;
        match e {
            CryptoError::UnsupportedVersion(v) => Error::UnsupportedVersion(v),
            CryptoError::KeyDerivation(m) => Error::KeyDerivation(m),
            CryptoError::Encryption(m) => Error::Encryption(m),
            // A malformed envelope cannot be opened; callers treat it like a bad tag.
            other @ (CryptoError::Decryption(_) | CryptoError::InvalidEnvelope { .. }) => {
                Error::Decryption(other.to_string())
            }
            CryptoError::InvalidAddress(m) => Error::InvalidInput(format!("invalid address: {}", m)),
            CryptoError::Json(err) => Error::Serialization(err.to_string()),
        }
    }
}
