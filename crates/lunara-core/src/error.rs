//! Error types for lunara.

use thiserror::Error;

/// Result type alias using lunara's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lunara operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No valid signer or session is available.
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// The user declined to sign in their wallet. Never retried.
    #[error("Signature rejected: {0}")]
    SignatureRejected(String),

    /// The wallet could not be reached to produce a signature.
    #[error("Signature unavailable: {0}")]
    SignatureTransient(String),

    /// Key derivation failed
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Encryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// AEAD authentication failed or envelope could not be opened
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Envelope carries a version tag this build does not understand
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(String),

    /// Local persistence layer is inaccessible
    #[error("Storage unavailable: {0}")]
    Storage(String),

    /// Upload to content-addressed storage failed
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Download from content-addressed storage failed
    #[error("Fetch failed for {content_id}: {message}")]
    Fetch {
        content_id: String,
        /// True when the store reported the identifier as unknown, which for
        /// freshly published content usually means it has not propagated yet.
        not_found: bool,
        message: String,
    },

    /// Registry write failed for a reason other than funding
    #[error("Registry write failed: {0}")]
    RegistryWrite(String),

    /// Registry read failed
    #[error("Registry read failed: {0}")]
    RegistryRead(String),

    /// The signer cannot pay for the registry write
    #[error("Insufficient funds: {address} cannot pay for the registry write")]
    InsufficientFunds { address: String, message: String },

    /// Package is in content-addressed storage but the registry write failed.
    /// The blob is orphaned until registration is retried.
    #[error("Published as {content_id} but not registered: {source}")]
    PublishedNotRegistered {
        content_id: String,
        gateway_url: String,
        #[source]
        source: Box<Error>,
    },

    /// Not a single record survived the sender-side decrypt
    #[error("No entries could be decrypted for sharing ({attempted} attempted)")]
    NothingToShare { attempted: usize },

    /// The canary no longer decrypts with this session's key material
    #[error("Wallet key material changed: {0}")]
    KeyMaterialChanged(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if retrying the same operation could succeed.
    ///
    /// Only transient wallet and network failures qualify. Crypto failures
    /// are deterministic and funding problems need the user to act.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::SignatureTransient(_)
            | Error::Publish(_)
            | Error::Fetch { .. }
            | Error::RegistryRead(_)
            | Error::RegistryWrite(_) => true,
            Error::PublishedNotRegistered { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// True for the DecryptionFailed family (bad tag, wrong key, unknown version).
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Error::Decryption(_) | Error::UnsupportedVersion(_))
    }

    /// True for errors the user can fix themselves (fund wallet, approve signature).
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientFunds { .. }
                | Error::SignatureRejected(_)
                | Error::AuthenticationRequired(_)
                | Error::KeyMaterialChanged(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
