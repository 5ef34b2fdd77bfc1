//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! Two schemes share one primitive:
//!
//! - **self**: password is the wallet signature of [`signing_message`], salt
//!   is the envelope's random salt bytes.
//! - **recipient**: password is the lower-cased recipient address followed by
//!   the salt string, salt is the salt string's UTF-8 bytes. The recipient can
//!   rebuild the key from their own address and the envelope alone.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use lunara_core::defaults::{
    ENVELOPE_VERSION, KDF_ITERATIONS, KEY_LENGTH, SIGNING_MESSAGE_PREFIX,
};

use crate::error::{CryptoError, CryptoResult};

/// PBKDF2 parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParams {
    /// Iteration count (default: 100,000).
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: KDF_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }
}

/// Key wrapper with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Create a derived key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// The message the wallet signs to unlock the self key.
///
/// Embeds the user id and the envelope version so a future format can use a
/// different signature.
pub fn signing_message(user_id: &str) -> String {
    format!("{}-{}-{}", SIGNING_MESSAGE_PREFIX, user_id, ENVELOPE_VERSION)
}

/// Lower-case and trim a wallet address.
pub fn normalize_address(address: &str) -> CryptoResult<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(CryptoError::InvalidAddress("address cannot be empty".into()));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(CryptoError::InvalidAddress(format!(
            "address contains whitespace: {:?}",
            trimmed
        )));
    }
    Ok(trimmed.to_lowercase())
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], params: &KdfParams) -> CryptoResult<DerivedKey> {
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be non-zero".into(),
        ));
    }
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password, salt, params.iterations, &mut key);
    let derived = DerivedKey { key };
    key.zeroize();
    Ok(derived)
}

/// Derive the self key from a wallet signature and the envelope salt bytes.
pub fn derive_self_key(
    signature: &str,
    salt: &[u8],
    params: &KdfParams,
) -> CryptoResult<DerivedKey> {
    if signature.is_empty() {
        return Err(CryptoError::KeyDerivation("signature is empty".into()));
    }
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("salt is empty".into()));
    }
    pbkdf2_sha256(signature.as_bytes(), salt, params)
}

/// Derive a recipient key from a public address and the envelope salt string.
pub fn derive_recipient_key(
    address: &str,
    salt: &str,
    params: &KdfParams,
) -> CryptoResult<DerivedKey> {
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("salt is empty".into()));
    }
    let mut password = Zeroizing::new(normalize_address(address)?);
    password.push_str(salt);
    pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), params)
}

/// [`derive_self_key`] on the blocking pool.
pub async fn derive_self_key_async(
    signature: Zeroizing<String>,
    salt: Vec<u8>,
    params: KdfParams,
) -> CryptoResult<DerivedKey> {
    tokio::task::spawn_blocking(move || derive_self_key(&signature, &salt, &params))
        .await
        .map_err(|e| CryptoError::KeyDerivation(format!("derivation task failed: {}", e)))?
}

/// [`derive_recipient_key`] on the blocking pool.
pub async fn derive_recipient_key_async(
    address: String,
    salt: String,
    params: KdfParams,
) -> CryptoResult<DerivedKey> {
    tokio::task::spawn_blocking(move || derive_recipient_key(&address, &salt, &params))
        .await
        .map_err(|e| CryptoError::KeyDerivation(format!("derivation task failed: {}", e)))?
}
