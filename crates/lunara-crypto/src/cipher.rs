//! AES-256-GCM with a detached tag, plus the random material it needs.
//!
//! Envelopes carry ciphertext and tag as separate fields, so the AEAD is run
//! in place and the 16-byte tag is handed back on its own.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use rand::RngCore;

use lunara_core::defaults::{KEY_LENGTH, NONCE_LENGTH, SALT_LENGTH, TAG_LENGTH};

use crate::error::{CryptoError, CryptoResult};

/// Ciphertext with its authentication tag kept apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LENGTH],
}

pub fn generate_random<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

pub fn generate_salt() -> [u8; SALT_LENGTH] {
    generate_random()
}

pub fn generate_salt_hex() -> String {
    hex::encode(generate_salt())
}

pub fn generate_nonce() -> [u8; NONCE_LENGTH] {
    generate_random()
}

/// Encrypt `plaintext`; the ciphertext has the same length as the input.
pub fn seal_detached(
    key: &[u8; KEY_LENGTH],
    nonce: &[u8; NONCE_LENGTH],
    plaintext: &[u8],
) -> CryptoResult<Sealed> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut ciphertext = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), b"", &mut ciphertext)
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".into()))?;

    let mut tag_bytes = [0u8; TAG_LENGTH];
    tag_bytes.copy_from_slice(tag.as_slice());
    Ok(Sealed {
        ciphertext,
        tag: tag_bytes,
    })
}

/// Verify `tag` and decrypt. Nothing is returned unless the tag matches.
pub fn open_detached(
    key: &[u8; KEY_LENGTH],
    nonce: &[u8; NONCE_LENGTH],
    ciphertext: &[u8],
    tag: &[u8; TAG_LENGTH],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| CryptoError::Decryption("invalid key".to_string()))?;

    let mut plaintext = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            &mut plaintext,
            Tag::from_slice(tag),
        )
        .map_err(|_| CryptoError::Decryption("authentication failed".to_string()))?;
    Ok(plaintext)
}
