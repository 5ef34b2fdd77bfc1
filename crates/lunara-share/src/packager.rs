//! Resharing packager.
//!
//! Takes the user's own records, decrypts any that arrive sealed under the
//! self key, re-encrypts each for the recipient's address and bundles the
//! result into a [`SharePackage`]. Inputs that fail the self decrypt are
//! dropped; the whole operation fails only when none survive. Survivors are
//! numbered `1..=n` in input order, so entry ids never have gaps.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use lunara_core::models::Record;
use lunara_core::{BatchResult, Error, FailureInfo, Result, ShareType};
use lunara_crypto::{normalize_address, EncryptedEnvelope, Session};

use crate::package::{ShareEntry, SharePackage};

/// A record offered for sharing.
#[derive(Debug, Clone)]
pub enum ShareInput {
    /// Already decrypted by the caller.
    Plain(Record),
    /// Still sealed under the sender's self key, as read from local storage.
    Encrypted {
        envelope: EncryptedEnvelope,
        timestamp: i64,
        local_timestamp: i64,
    },
}

impl From<Record> for ShareInput {
    fn from(record: Record) -> Self {
        ShareInput::Plain(record)
    }
}

/// Plaintext that survived step one.
struct Prepared {
    timestamp: i64,
    local_timestamp: i64,
    plaintext: Vec<u8>,
}

/// Builds share packages for one session.
pub struct Packager {
    session: Arc<Session>,
}

impl Packager {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Package `inputs` for `recipient`. Undecryptable inputs are dropped.
    pub async fn share_data(
        &self,
        recipient: &str,
        share_type: ShareType,
        inputs: Vec<ShareInput>,
    ) -> Result<SharePackage> {
        Ok(self.share_data_report(recipient, share_type, inputs).await?.0)
    }

    /// Like [`share_data`](Self::share_data), also returning what was dropped.
    pub async fn share_data_report(
        &self,
        recipient: &str,
        share_type: ShareType,
        inputs: Vec<ShareInput>,
    ) -> Result<(SharePackage, Vec<FailureInfo>)> {
        let recipient = normalize_address(recipient)?;
        let attempted = inputs.len();

        let mut batch: BatchResult<Prepared> = BatchResult::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let position = index + 1;
            match self.prepare(position, input).await {
                Ok(prepared) => batch.push_ok(prepared),
                Err(e @ Error::AuthenticationRequired(_))
                | Err(e @ Error::SignatureRejected(_))
                | Err(e @ Error::SignatureTransient(_)) => return Err(e),
                Err(e) => {
                    warn!(position, error = %e, "Dropping input that failed to decrypt for sharing");
                    batch.push_err(position.to_string(), &e);
                }
            }
        }

        if batch.succeeded.is_empty() {
            return Err(Error::NothingToShare { attempted });
        }

        let numbered = batch
            .succeeded
            .iter()
            .enumerate()
            .map(|(i, p)| {
                u32::try_from(i + 1)
                    .map(|entry_id| (entry_id, p))
                    .map_err(|_| Error::InvalidInput(format!("too many entries: {}", attempted)))
            })
            .collect::<Result<Vec<_>>>()?;

        let cipher = self.session.recipient_cipher();
        let recipient_ref = recipient.as_str();
        let entries = try_join_all(numbered.into_iter().map(|(entry_id, p)| async move {
            let envelope = cipher
                .encrypt(recipient_ref, &p.plaintext)
                .await
                .map_err(|e| Error::Encryption(format!("entry {}: {}", entry_id, e)))?;
            Ok::<_, Error>(ShareEntry {
                encrypted_data: envelope,
                timestamp: p.timestamp,
                local_timestamp: p.local_timestamp,
                entry_id,
            })
        }))
        .await?;

        let package = SharePackage::new(
            self.session.user_id(),
            share_type,
            Utc::now().timestamp_millis(),
            entries,
        );
        info!(
            share_type = %share_type,
            succeeded = package.len(),
            failed = batch.failed.len(),
            "Built share package"
        );
        Ok((package, batch.failed))
    }

    async fn prepare(&self, position: usize, input: ShareInput) -> Result<Prepared> {
        match input {
            ShareInput::Plain(record) => {
                record.validate()?;
                let timestamp = record.timestamp_millis();
                Ok(Prepared {
                    timestamp,
                    local_timestamp: timestamp,
                    plaintext: serde_json::to_vec(&record)?,
                })
            }
            ShareInput::Encrypted {
                envelope,
                timestamp,
                local_timestamp,
            } => {
                let plaintext = self.session.decrypt_for_self(&envelope).await?;
                // Only well-formed records go out.
                let record: Record = serde_json::from_slice(&plaintext)
                    .map_err(|e| Error::Decryption(format!("not a record: {}", e)))?;
                debug!(position, record_id = %record.id, "Decrypted input for sharing");
                Ok(Prepared {
                    timestamp,
                    local_timestamp,
                    plaintext: serde_json::to_vec(&record)?,
                })
            }
        }
    }
}
