//! # lunara-crypto
//!
//! Encryption primitives for lunara records and shares.
//!
//! ## Cryptographic Primitives
//!
//! - **Symmetric cipher**: AES-256-GCM (AEAD), 96-bit random nonces
//! - **Key derivation**: PBKDF2-HMAC-SHA256, 100,000 iterations, 256-bit keys
//! - **Random generation**: OS-seeded CSPRNG
//!
//! ## Key Schemes
//!
//! | Scheme    | Password                          | Salt                         |
//! |-----------|-----------------------------------|------------------------------|
//! | self      | wallet signature of `PrivyCycle-{userId}-v1` | 16 random bytes (hex in envelope) |
//! | recipient | lower-cased address ‖ salt string | salt string (random hex or protocol constant) |
//!
//! Both schemes feed the same [`EncryptedEnvelope`] seal/open code.
//!
//! ## Example
//!
//! ```rust
//! use lunara_crypto::{DerivedKey, EncryptedEnvelope};
//!
//! let key = DerivedKey::from_bytes([7u8; 32]);
//! let envelope = EncryptedEnvelope::seal(b"flow: medium", &key, "00ff".into()).unwrap();
//! assert_eq!(envelope.open(&key).unwrap(), b"flow: medium");
//! ```

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod recipient;
pub mod session;

// Re-export commonly used types
pub use envelope::EncryptedEnvelope;
pub use error::{CryptoError, CryptoResult};
pub use kdf::{
    derive_recipient_key, derive_self_key, normalize_address, signing_message, DerivedKey,
    KdfParams,
};
pub use recipient::RecipientCipher;
pub use session::Session;
