//! Self-describing ciphertext envelope.
//!
//! Wire shape (JSON, all binary fields lower-case hex):
//!
//! ```text
//! { "version": "v1", "salt": "...", "iv": "...", "data": "...", "tag": "..." }
//! ```
//!
//! `data` and `tag` are the detached AES-GCM ciphertext and tag. The `salt` field is opaque here: the
//! self scheme stores hex-encoded random bytes, the recipient scheme stores the
//! salt string verbatim.

use serde::{Deserialize, Serialize};

use lunara_core::defaults::{ENVELOPE_VERSION, NONCE_LENGTH, TAG_LENGTH};

use crate::cipher::{generate_nonce, open_detached, seal_detached};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;

/// The on-disk/on-wire unit of ciphertext. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub version: String,
    pub salt: String,
    #[serde(rename = "iv")]
    pub nonce: String,
    #[serde(rename = "data")]
    pub ciphertext: String,
    pub tag: String,
}

impl EncryptedEnvelope {
    /// Encrypt `plaintext` under `key` with a fresh nonce.
    ///
    /// `salt` is recorded as-is so the reader can re-derive the key.
    pub fn seal(plaintext: &[u8], key: &DerivedKey, salt: String) -> CryptoResult<Self> {
        let nonce = generate_nonce();
        let sealed = seal_detached(key.as_bytes(), &nonce, plaintext)?;

        Ok(Self {
            version: ENVELOPE_VERSION.to_string(),
            salt,
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(sealed.ciphertext),
            tag: hex::encode(sealed.tag),
        })
    }

    /// Decrypt with `key`. The version is checked before anything else.
    pub fn open(&self, key: &DerivedKey) -> CryptoResult<Vec<u8>> {
        self.check_version()?;

        let nonce = self.nonce_bytes()?;
        let ciphertext = decode_field("data", &self.ciphertext)?;
        let tag: [u8; TAG_LENGTH] = decode_field("tag", &self.tag)?.try_into().map_err(
            |v: Vec<u8>| CryptoError::InvalidEnvelope {
                field: "tag",
                message: format!("expected {} bytes, got {}", TAG_LENGTH, v.len()),
            },
        )?;

        open_detached(key.as_bytes(), &nonce, &ciphertext, &tag)
    }

    /// Fail closed on any version tag other than the current one.
    pub fn check_version(&self) -> CryptoResult<()> {
        if self.version != ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedVersion(self.version.clone()));
        }
        Ok(())
    }

    /// Salt decoded from hex (self scheme).
    pub fn salt_bytes(&self) -> CryptoResult<Vec<u8>> {
        let salt = decode_field("salt", &self.salt)?;
        if salt.is_empty() {
            return Err(CryptoError::InvalidEnvelope {
                field: "salt",
                message: "empty".into(),
            });
        }
        Ok(salt)
    }

    fn nonce_bytes(&self) -> CryptoResult<[u8; NONCE_LENGTH]> {
        let raw = decode_field("iv", &self.nonce)?;
        raw.try_into().map_err(|v: Vec<u8>| CryptoError::InvalidEnvelope {
            field: "iv",
            message: format!("expected {} bytes, got {}", NONCE_LENGTH, v.len()),
        })
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn decode_field(field: &'static str, value: &str) -> CryptoResult<Vec<u8>> {
    hex::decode(value).map_err(|e| CryptoError::InvalidEnvelope {
        field,
        message: e.to_string(),
    })
}
