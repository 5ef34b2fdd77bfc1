//! Local encrypted store.
//!
//! Every value is serialized to JSON, sealed under the session's self key and
//! persisted as a row `{ "id", "encryptedData": <envelope> }` keyed by id.
//! Reads decrypt row by row; a row that fails to open is logged and skipped
//! so one bad record never blocks the rest.
//!
//! All operations on one store instance are serialized by a single async
//! mutex, so a read issued after a write to the same id observes it.

use std::sync::Arc;

use chrono::SubsecRound;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use lunara_core::defaults::{CANARY_KEY, CANARY_PLAINTEXT};
use lunara_core::models::{sort_newest_first, CycleData, Identified, Prediction, Record, RecordPatch};
use lunara_core::traits::{KeyValueStore, StoreName};
use lunara_core::{BatchResult, Error, Result};
use lunara_crypto::{EncryptedEnvelope, Session};

/// Persisted row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRow {
    pub id: String,
    pub encrypted_data: EncryptedEnvelope,
}

/// Outcome of [`EncryptedStore::verify_key_material`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    /// No canary existed; one was written with the current key material.
    Established,
    /// The existing canary decrypted correctly.
    Verified,
}

/// Encrypted record, cycle and prediction store for one session.
pub struct EncryptedStore {
    kv: Arc<dyn KeyValueStore>,
    session: Arc<Session>,
    lock: Mutex<()>,
}

impl EncryptedStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, session: Arc<Session>) -> Self {
        Self {
            kv,
            session,
            lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    // =========================================================================
    // Row codec
    // =========================================================================

    async fn seal_row<T: Serialize + Identified>(&self, value: &T) -> Result<Vec<u8>> {
        let plaintext = serde_json::to_vec(value)?;
        let row = EncryptedRow {
            id: value.id().to_string(),
            encrypted_data: self.session.encrypt_for_self(&plaintext).await?,
        };
        Ok(serde_json::to_vec(&row)?)
    }

    async fn open_row<T: DeserializeOwned + Identified>(&self, key: &str, bytes: &[u8]) -> Result<T> {
        let row: EncryptedRow = serde_json::from_slice(bytes)
            .map_err(|e| Error::Decryption(format!("unreadable row: {}", e)))?;
        let plaintext = self.session.decrypt_for_self(&row.encrypted_data).await?;
        let value: T = serde_json::from_slice(&plaintext)?;
        if value.id() != key || row.id != key {
            return Err(Error::Decryption(format!(
                "row stored under {} decrypted to id {}",
                key,
                value.id()
            )));
        }
        Ok(value)
    }

    async fn put_value<T: Serialize + Identified>(&self, store: StoreName, value: &T) -> Result<()> {
        let bytes = self.seal_row(value).await?;
        self.kv.put(store, value.id(), bytes).await
    }

    async fn read_all<T: DeserializeOwned + Identified>(&self, store: StoreName) -> Result<BatchResult<T>> {
        let rows = self.kv.get_all(store).await?;
        let mut batch = BatchResult::new();
        for (key, bytes) in rows {
            trace!(store = %store, record_id = %key, "Decrypting row");
            match self.open_row::<T>(&key, &bytes).await {
                Ok(value) => batch.push_ok(value),
                // Losing the session is not a per-row problem.
                Err(e @ Error::AuthenticationRequired(_))
                | Err(e @ Error::SignatureRejected(_))
                | Err(e @ Error::SignatureTransient(_)) => return Err(e),
                Err(e) => {
                    warn!(store = %store, record_id = %key, error = %e, "Skipping row that failed to decrypt");
                    batch.push_err(key, &e);
                }
            }
        }
        debug!(
            store = %store,
            succeeded = batch.succeeded.len(),
            failed = batch.failed.len(),
            "Read store"
        );
        Ok(batch)
    }

    async fn get_value<T: DeserializeOwned + Identified>(&self, store: StoreName, id: &str) -> Result<Option<T>> {
        match self.kv.get(store, id).await? {
            Some(bytes) => Ok(Some(self.open_row(id, &bytes).await?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Encrypt and persist a record, replacing any record with the same id.
    ///
    /// Dates are stored at millisecond precision; the returned record is the
    /// value later reads will produce.
    pub async fn put_record(&self, record: &Record) -> Result<Record> {
        record.validate()?;
        let mut stored = record.clone();
        stored.date = stored.date.trunc_subsecs(3);
        let _guard = self.lock.lock().await;
        self.put_value(StoreName::Records, &stored).await?;
        debug!(record_id = %stored.id, "Stored record");
        Ok(stored)
    }

    /// Every readable record, newest first. Unreadable rows are skipped.
    pub async fn get_all_records(&self) -> Result<Vec<Record>> {
        Ok(self.get_all_records_report().await?.into_succeeded())
    }

    /// Like [`get_all_records`](Self::get_all_records) but also reports the
    /// rows that could not be decrypted.
    pub async fn get_all_records_report(&self) -> Result<BatchResult<Record>> {
        let _guard = self.lock.lock().await;
        let mut batch = self.read_all::<Record>(StoreName::Records).await?;
        sort_newest_first(&mut batch.succeeded);
        Ok(batch)
    }

    /// One record by id.
    pub async fn get_record(&self, id: &str) -> Result<Option<Record>> {
        let _guard = self.lock.lock().await;
        self.get_value(StoreName::Records, id).await
    }

    /// Merge `patch` into the stored record and re-encrypt it.
    pub async fn update_record(&self, id: &str, patch: RecordPatch) -> Result<Record> {
        let _guard = self.lock.lock().await;
        let mut record: Record = self
            .get_value(StoreName::Records, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("record {}", id)))?;
        record.apply(patch);
        record.validate()?;
        self.put_value(StoreName::Records, &record).await?;
        debug!(record_id = %id, "Updated record");
        Ok(record)
    }

    /// Remove a record. No decryption involved.
    pub async fn delete_record(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.kv.delete(StoreName::Records, id).await?;
        debug!(record_id = %id, "Deleted record");
        Ok(())
    }

    // =========================================================================
    // Cycles and predictions
    // =========================================================================

    pub async fn save_cycle(&self, cycle: &CycleData) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.put_value(StoreName::CycleData, cycle).await
    }

    /// Every readable cycle, most recent start first.
    pub async fn get_cycles(&self) -> Result<Vec<CycleData>> {
        let _guard = self.lock.lock().await;
        let mut cycles = self
            .read_all::<CycleData>(StoreName::CycleData)
            .await?
            .into_succeeded();
        cycles.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(cycles)
    }

    pub async fn delete_cycle(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.kv.delete(StoreName::CycleData, id).await
    }

    pub async fn save_prediction(&self, prediction: &Prediction) -> Result<()> {
        if !(0.0..=1.0).contains(&prediction.confidence) {
            return Err(Error::InvalidInput(format!(
                "confidence must be within 0-1, got {}",
                prediction.confidence
            )));
        }
        let _guard = self.lock.lock().await;
        self.put_value(StoreName::Predictions, prediction).await
    }

    /// Every readable prediction, soonest next period first.
    pub async fn get_predictions(&self) -> Result<Vec<Prediction>> {
        let _guard = self.lock.lock().await;
        let mut predictions = self
            .read_all::<Prediction>(StoreName::Predictions)
            .await?
            .into_succeeded();
        predictions.sort_by(|a, b| a.next_period_date.cmp(&b.next_period_date));
        Ok(predictions)
    }

    /// Wipe records, cycles and predictions. The key canary is kept.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        for store in [StoreName::Records, StoreName::CycleData, StoreName::Predictions] {
            self.kv.clear(store).await?;
        }
        info!("Cleared local encrypted store");
        Ok(())
    }

    // =========================================================================
    // Key material canary
    // =========================================================================

    /// Check the wallet still yields the key material this store was written
    /// with.
    ///
    /// The first call seals a canary into the meta store. Later calls must be
    /// able to open it; otherwise the wallet's signature changed and older
    /// data is unreadable, reported as `Error::KeyMaterialChanged`.
    pub async fn verify_key_material(&self) -> Result<KeyCheck> {
        let _guard = self.lock.lock().await;
        let Some(bytes) = self.kv.get(StoreName::Meta, CANARY_KEY).await? else {
            let envelope = self.session.encrypt_for_self(CANARY_PLAINTEXT.as_bytes()).await?;
            let row = EncryptedRow {
                id: CANARY_KEY.to_string(),
                encrypted_data: envelope,
            };
            self.kv
                .put(StoreName::Meta, CANARY_KEY, serde_json::to_vec(&row)?)
                .await?;
            info!("Established key material canary");
            return Ok(KeyCheck::Established);
        };

        let row: EncryptedRow = serde_json::from_slice(&bytes)
            .map_err(|e| Error::KeyMaterialChanged(format!("canary unreadable: {}", e)))?;
        match self.session.decrypt_for_self(&row.encrypted_data).await {
            Ok(plaintext) if plaintext == CANARY_PLAINTEXT.as_bytes() => Ok(KeyCheck::Verified),
            Ok(_) => Err(Error::KeyMaterialChanged(
                "canary decrypted to unexpected content".to_string(),
            )),
            Err(e) if e.is_decryption_failure() => {
                warn!(error = %e, "Key material canary failed to decrypt");
                Err(Error::KeyMaterialChanged(
                    "wallet signature no longer matches stored data".to_string(),
                ))
            }
            Err(e) => Err(e),
        }
    }
}
