//! Recipient-keyed envelopes.
//!
//! Anyone who knows a recipient's public address can encrypt for them; the
//! recipient decrypts with their own address and the salt carried in the
//! envelope. No signature is needed on either side.

use lunara_core::config::RecipientSaltMode;
use lunara_core::defaults::RECIPIENT_SALT;
use tracing::trace;

use crate::cipher::generate_salt_hex;
use crate::envelope::EncryptedEnvelope;
use crate::error::CryptoResult;
use crate::kdf::{derive_recipient_key_async, normalize_address, DerivedKey, KdfParams};

/// Encrypts for and decrypts as a wallet address.
#[derive(Debug, Clone, Copy)]
pub struct RecipientCipher {
    params: KdfParams,
    salt_mode: RecipientSaltMode,
}

impl Default for RecipientCipher {
    fn default() -> Self {
        Self::new(KdfParams::default(), RecipientSaltMode::default())
    }
}

impl RecipientCipher {
    pub fn new(params: KdfParams, salt_mode: RecipientSaltMode) -> Self {
        Self { params, salt_mode }
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }

    pub fn salt_mode(&self) -> RecipientSaltMode {
        self.salt_mode
    }

    /// Salt string for the next envelope.
    pub fn next_salt(&self) -> String {
        match self.salt_mode {
            RecipientSaltMode::PerMessage => generate_salt_hex(),
            RecipientSaltMode::ProtocolConstant => RECIPIENT_SALT.to_string(),
        }
    }

    /// Derive the key for `address` and `salt`.
    pub async fn key_for(&self, address: &str, salt: &str) -> CryptoResult<DerivedKey> {
        derive_recipient_key_async(normalize_address(address)?, salt.to_string(), self.params).await
    }

    /// Encrypt `plaintext` for `recipient`.
    pub async fn encrypt(&self, recipient: &str, plaintext: &[u8]) -> CryptoResult<EncryptedEnvelope> {
        let salt = self.next_salt();
        let key = self.key_for(recipient, &salt).await?;
        trace!(salt_mode = %self.salt_mode, "Sealing envelope for recipient");
        EncryptedEnvelope::seal(plaintext, &key, salt)
    }

    /// Decrypt an envelope addressed to `viewer`.
    ///
    /// Uses the envelope's own salt, so both salt modes open here.
    pub async fn decrypt(&self, viewer: &str, envelope: &EncryptedEnvelope) -> CryptoResult<Vec<u8>> {
        envelope.check_version()?;
        let key = self.key_for(viewer, &envelope.salt).await?;
        envelope.open(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;

    fn cipher(mode: RecipientSaltMode) -> RecipientCipher {
        RecipientCipher::new(KdfParams::new(1_000), mode)
    }

    #[tokio::test]
    async fn test_recipient_roundtrip_per_message() {
        let c = cipher(RecipientSaltMode::PerMessage);
        let envelope = c.encrypt("0xABC", b"shared").await.unwrap();
        assert_eq!(envelope.salt.len(), 32);
        assert_eq!(c.decrypt("0xabc", &envelope).await.unwrap(), b"shared");
    }

    #[tokio::test]
    async fn test_constant_salt_mode() {
        let c = cipher(RecipientSaltMode::ProtocolConstant);
        let envelope = c.encrypt("0xABC", b"shared").await.unwrap();
        assert_eq!(envelope.salt, "privycycle-sharing-v1");
        assert_eq!(c.decrypt("0xABC", &envelope).await.unwrap(), b"shared");
    }

    #[tokio::test]
    async fn test_modes_interoperate() {
        let writer = cipher(RecipientSaltMode::ProtocolConstant);
        let reader = cipher(RecipientSaltMode::PerMessage);
        let envelope = writer.encrypt("0xabc", b"legacy").await.unwrap();
        assert_eq!(reader.decrypt("0xabc", &envelope).await.unwrap(), b"legacy");
    }

    #[tokio::test]
    async fn test_wrong_viewer_fails() {
        let c = cipher(RecipientSaltMode::PerMessage);
        let envelope = c.encrypt("0xABC", b"shared").await.unwrap();
        assert!(matches!(
            c.decrypt("0xDEF", &envelope).await,
            Err(CryptoError::Decryption(_))
        ));
    }

    #[tokio::test]
    async fn test_per_message_salts_differ() {
        let c = cipher(RecipientSaltMode::PerMessage);
        let a = c.encrypt("0xabc", b"x").await.unwrap();
        let b = c.encrypt("0xabc", b"x").await.unwrap();
        assert_ne!(a.salt, b.salt);
    }
}
