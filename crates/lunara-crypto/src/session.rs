//! Per-login crypto session.
//!
//! A [`Session`] owns the wallet handle and the cached self-key signature.
//! The wallet is asked to sign at most once per session; concurrent callers
//! wait for the first request instead of prompting again. [`Session::logout`]
//! clears the cache synchronously and bumps an epoch so a signature that
//! arrives after logout is thrown away rather than cached.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use lunara_core::config::LunaraConfig;
use lunara_core::retry::{retry_async, RetryPolicy};
use lunara_core::traits::WalletProvider;
use lunara_core::{Error, Result};

use crate::cipher::generate_salt;
use crate::envelope::EncryptedEnvelope;
use crate::kdf::{derive_self_key_async, signing_message, DerivedKey, KdfParams};
use crate::recipient::RecipientCipher;

#[derive(Default)]
struct SessionState {
    epoch: u64,
    closed: bool,
    signature: Option<Zeroizing<String>>,
}

/// Explicit session object holding the signature cache.
pub struct Session {
    wallet: Arc<dyn WalletProvider>,
    user_id: String,
    params: KdfParams,
    recipient: RecipientCipher,
    wallet_retry: RetryPolicy,
    state: Mutex<SessionState>,
    signing: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("epoch", &state.epoch)
            .field("closed", &state.closed)
            .field("signature_cached", &state.signature.is_some())
            .finish()
    }
}

impl Session {
    /// Start a session for whoever is logged into `wallet`.
    pub fn open(wallet: Arc<dyn WalletProvider>, config: &LunaraConfig) -> Result<Self> {
        let user_id = wallet
            .user_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::AuthenticationRequired("no user is logged in".to_string()))?;

        debug!(kdf_iterations = config.kdf_iterations, "Opening crypto session");

        Ok(Self {
            wallet,
            user_id,
            params: KdfParams::new(config.kdf_iterations),
            recipient: RecipientCipher::new(
                KdfParams::new(config.kdf_iterations),
                config.recipient_salt_mode,
            ),
            wallet_retry: config.wallet_retry.clone(),
            state: Mutex::new(SessionState::default()),
            signing: tokio::sync::Mutex::new(()),
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Connected wallet address.
    pub fn wallet_address(&self) -> Result<String> {
        self.wallet
            .wallet_address()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::AuthenticationRequired("no wallet connected".to_string()))
    }

    pub fn kdf_params(&self) -> KdfParams {
        self.params
    }

    pub fn recipient_cipher(&self) -> &RecipientCipher {
        &self.recipient
    }

    pub fn is_active(&self) -> bool {
        !self.state().closed
    }

    pub fn has_cached_signature(&self) -> bool {
        self.state().signature.is_some()
    }

    /// End the session. Clears the cached signature before returning; every
    /// later call fails with `AuthenticationRequired`.
    pub fn logout(&self) {
        let mut state = self.state();
        state.signature = None;
        state.closed = true;
        state.epoch += 1;
        info!(epoch = state.epoch, "Crypto session logged out");
    }

    fn ensure_epoch(&self, epoch: u64) -> Result<()> {
        let state = self.state();
        if state.closed || state.epoch != epoch {
            return Err(Error::AuthenticationRequired(
                "session ended during operation".to_string(),
            ));
        }
        Ok(())
    }

    /// Cached signature and the epoch it belongs to, if any.
    fn cached(&self) -> Result<(u64, Option<Zeroizing<String>>)> {
        let state = self.state();
        if state.closed {
            return Err(Error::AuthenticationRequired("session has ended".to_string()));
        }
        Ok((state.epoch, state.signature.clone()))
    }

    /// The self-key signature, requesting it from the wallet on first use.
    ///
    /// Transient wallet failures are retried per the wallet retry policy;
    /// a rejected prompt is returned immediately.
    pub async fn signature(&self) -> Result<(u64, Zeroizing<String>)> {
        if let (epoch, Some(sig)) = self.cached()? {
            return Ok((epoch, sig));
        }

        let _signing = self.signing.lock().await;

        // Another caller may have finished while we waited.
        let (epoch, cached) = self.cached()?;
        if let Some(sig) = cached {
            return Ok((epoch, sig));
        }

        if self.wallet.user_id().as_deref() != Some(self.user_id.as_str()) {
            return Err(Error::AuthenticationRequired(
                "wallet user changed since session opened".to_string(),
            ));
        }

        let message = signing_message(&self.user_id);
        let wallet = self.wallet.as_ref();
        let message_ref = message.as_str();
        debug!("Requesting self-key signature from wallet");
        let signature = retry_async(&self.wallet_retry, "sign_message", move |_| {
            wallet.sign_message(message_ref)
        })
        .await?;

        if signature.is_empty() {
            return Err(Error::SignatureTransient(
                "wallet returned an empty signature".to_string(),
            ));
        }

        let mut state = self.state();
        if state.closed || state.epoch != epoch {
            warn!("Discarding signature that arrived after logout");
            return Err(Error::AuthenticationRequired(
                "session ended while waiting for signature".to_string(),
            ));
        }
        let signature = Zeroizing::new(signature);
        state.signature = Some(signature.clone());
        Ok((epoch, signature))
    }

    /// Derive the self key for the given salt bytes.
    pub async fn self_key(&self, salt: &[u8]) -> Result<DerivedKey> {
        let (epoch, signature) = self.signature().await?;
        let key = derive_self_key_async(signature, salt.to_vec(), self.params).await?;
        self.ensure_epoch(epoch)?;
        Ok(key)
    }

    /// Encrypt under the self key with a fresh random salt.
    pub async fn encrypt_for_self(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
        let salt = generate_salt();
        let key = self.self_key(&salt).await?;
        Ok(EncryptedEnvelope::seal(plaintext, &key, hex::encode(salt))?)
    }

    /// Decrypt a self-scheme envelope.
    ///
    /// Unknown versions fail before the wallet is consulted.
    pub async fn decrypt_for_self(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
        envelope.check_version()?;
        let salt = envelope.salt_bytes()?;
        let key = self.self_key(&salt).await?;
        Ok(envelope.open(&key)?)
    }

    /// Encrypt for another wallet address using the configured salt mode.
    pub async fn encrypt_for_recipient(
        &self,
        recipient: &str,
        plaintext: &[u8],
    ) -> Result<EncryptedEnvelope> {
        Ok(self.recipient.encrypt(recipient, plaintext).await?)
    }

    /// Decrypt an envelope addressed to this session's wallet.
    pub async fn decrypt_as_recipient(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
        let address = self.wallet_address()?;
        Ok(self.recipient.decrypt(&address, envelope).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct TestWallet {
        user: Option<String>,
        calls: AtomicU32,
        transient_failures: u32,
        reject: bool,
        gate: Option<Arc<Notify>>,
    }

    impl TestWallet {
        fn new() -> Self {
            Self {
                user: Some("user-1".into()),
                calls: AtomicU32::new(0),
                transient_failures: 0,
                reject: false,
                gate: None,
            }
        }
    }

    #[async_trait]
    impl WalletProvider for TestWallet {
        fn user_id(&self) -> Option<String> {
            self.user.clone()
        }

        fn wallet_address(&self) -> Option<String> {
            Some("0xAbC".into())
        }

        async fn sign_message(&self, message: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.reject {
                return Err(Error::SignatureRejected("user rejected".into()));
            }
            if n < self.transient_failures {
                return Err(Error::SignatureTransient("wallet offline".into()));
            }
            Ok(format!("sig({})", message))
        }
    }

    fn config() -> LunaraConfig {
        LunaraConfig {
            kdf_iterations: 1_000,
            wallet_retry: RetryPolicy::wallet().with_base_delay(Duration::from_millis(1)),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_requires_user() {
        let wallet = TestWallet {
            user: None,
            ..TestWallet::new()
        };
        let result = Session::open(Arc::new(wallet), &config());
        assert!(matches!(result, Err(Error::AuthenticationRequired(_))));
    }

    #[tokio::test]
    async fn test_self_roundtrip() {
        let session = Session::open(Arc::new(TestWallet::new()), &config()).unwrap();
        let envelope = session.encrypt_for_self(b"day 3").await.unwrap();
        assert_eq!(envelope.salt.len(), 32);
        assert_eq!(session.decrypt_for_self(&envelope).await.unwrap(), b"day 3");
    }

    #[tokio::test]
    async fn test_signature_requested_once() {
        let wallet = Arc::new(TestWallet::new());
        let session = Session::open(wallet.clone(), &config()).unwrap();
        for _ in 0..3 {
            session.encrypt_for_self(b"x").await.unwrap();
        }
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 1);
        assert!(session.has_cached_signature());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_prompt() {
        let wallet = Arc::new(TestWallet::new());
        let session = Arc::new(Session::open(wallet.clone(), &config()).unwrap());
        let a = tokio::spawn({
            let s = session.clone();
            async move { s.signature().await.map(|(_, sig)| sig.to_string()) }
        });
        let b = tokio::spawn({
            let s = session.clone();
            async move { s.signature().await.map(|(_, sig)| sig.to_string()) }
        });
        assert_eq!(a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let wallet = Arc::new(TestWallet {
            transient_failures: 2,
            ..TestWallet::new()
        });
        let session = Session::open(wallet.clone(), &config()).unwrap();
        session.signature().await.unwrap();
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_failures_exhausted() {
        let wallet = Arc::new(TestWallet {
            transient_failures: 10,
            ..TestWallet::new()
        });
        let session = Session::open(wallet.clone(), &config()).unwrap();
        let result = session.encrypt_for_self(b"x").await;
        assert!(matches!(result, Err(Error::SignatureTransient(_))));
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let wallet = Arc::new(TestWallet {
            reject: true,
            ..TestWallet::new()
        });
        let session = Session::open(wallet.clone(), &config()).unwrap();
        let result = session.encrypt_for_self(b"x").await;
        assert!(matches!(result, Err(Error::SignatureRejected(_))));
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_and_blocks() {
        let session = Session::open(Arc::new(TestWallet::new()), &config()).unwrap();
        let envelope = session.encrypt_for_self(b"x").await.unwrap();
        session.logout();
        assert!(!session.is_active());
        assert!(!session.has_cached_signature());
        assert!(matches!(
            session.decrypt_for_self(&envelope).await,
            Err(Error::AuthenticationRequired(_))
        ));
    }

    #[tokio::test]
    async fn test_signature_after_logout_discarded() {
        let gate = Arc::new(Notify::new());
        let wallet = Arc::new(TestWallet {
            gate: Some(gate.clone()),
            ..TestWallet::new()
        });
        let session = Arc::new(Session::open(wallet.clone(), &config()).unwrap());

        let pending = tokio::spawn({
            let s = session.clone();
            async move { s.signature().await.map(|_| ()) }
        });
        while wallet.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        session.logout();
        gate.notify_one();

        assert!(matches!(
            pending.await.unwrap(),
            Err(Error::AuthenticationRequired(_))
        ));
        assert!(!session.has_cached_signature());
    }

    #[tokio::test]
    async fn test_independent_sessions() {
        let a = Session::open(Arc::new(TestWallet::new()), &config()).unwrap();
        let b = Session::open(Arc::new(TestWallet::new()), &config()).unwrap();
        let envelope = a.encrypt_for_self(b"shared secret").await.unwrap();
        a.logout();
        // Same user and deterministic wallet: a fresh session re-derives the same key.
        assert_eq!(b.decrypt_for_self(&envelope).await.unwrap(), b"shared secret");
    }

    #[tokio::test]
    async fn test_unknown_version_skips_wallet() {
        let wallet = Arc::new(TestWallet::new());
        let session = Session::open(wallet.clone(), &config()).unwrap();
        let mut envelope = session.encrypt_for_self(b"x").await.unwrap();
        session.logout();

        let fresh = Session::open(wallet.clone(), &config()).unwrap();
        envelope.version = "v9".into();
        let calls_before = wallet.calls.load(Ordering::SeqCst);
        assert!(matches!(
            fresh.decrypt_for_self(&envelope).await,
            Err(Error::UnsupportedVersion(_))
        ));
        assert_eq!(wallet.calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn test_recipient_path_uses_wallet_address() {
        let session = Session::open(Arc::new(TestWallet::new()), &config()).unwrap();
        let envelope = session.encrypt_for_recipient("0xabc", b"to me").await.unwrap();
        assert_eq!(session.decrypt_as_recipient(&envelope).await.unwrap(), b"to me");
    }
}
