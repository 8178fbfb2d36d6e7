//! Unlocked-session management
//!
//! A session holds the decrypted signing key for one wallet. It starts
//! locked, unlocks with the wallet password, and locks again on request or
//! after [`DEFAULT_INACTIVITY_TIMEOUT`] without recorded activity.
//!
//! Expiry is enforced twice: a tokio timer task clears the key when the
//! deadline passes, and every access re-checks the deadline so a session
//! also expires when no runtime is driving the timer.

use crate::wallet_store::WalletVaultStore;
use nebula_core::{derive_keypair, Error, Pubkey, Result, Signature, SigningKeypair, TransactionSigner};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Inactivity period after which an unlocked session locks itself
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Snapshot of session state for callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// No key material is held
    pub locked: bool,
    /// Wallet the session is bound to, locked or not
    pub active_public_key: Option<Pubkey>,
    /// Time left before the inactivity lock, when unlocked
    pub remaining_before_lock: Option<Duration>,
}

/// Owned handle to the pending inactivity timer. Dropping it cancels the timer.
struct TimerHandle {
    task: JoinHandle<()>,
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct SessionState {
    keypair: Option<SigningKeypair>,
    active_public_key: Option<Pubkey>,
    last_activity: Instant,
    generation: u64,
    timer: Option<TimerHandle>,
}

impl SessionState {
    fn is_expired(&self, timeout: Duration) -> bool {
        self.keypair.is_some() && self.last_activity.elapsed() >= timeout
    }

    fn clear_key(&mut self) {
        self.keypair = None;
        self.generation = self.generation.wrapping_add(1);
        self.timer = None;
    }
}

struct SessionInner {
    store: Arc<WalletVaultStore>,
    timeout: Duration,
    state: Mutex<SessionState>,
    signing: Arc<AsyncMutex<()>>,
}

impl SessionInner {
    /// Lazy expiry check; must be called with the state lock held
    fn enforce_deadline(&self, state: &mut SessionState) {
        if state.is_expired(self.timeout) {
            state.clear_key();
            info!("Session locked after {:?} of inactivity", self.timeout);
        }
    }

    fn expire_if_current(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation && state.keypair.is_some() {
            // Aborting the running timer task only takes effect at its next
            // yield, and it has none left.
            state.clear_key();
            info!("Session locked after {:?} of inactivity", self.timeout);
        }
    }
}

/// Guard over the signing key of the active wallet.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<SessionInner>,
}

impl SessionGuard {
    /// Locked session with the default inactivity timeout
    pub fn new(store: Arc<WalletVaultStore>) -> Self {
        Self::with_timeout(store, DEFAULT_INACTIVITY_TIMEOUT)
    }

    /// Locked session with a custom inactivity timeout
    pub fn with_timeout(store: Arc<WalletVaultStore>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                timeout,
                state: Mutex::new(SessionState {
                    keypair: None,
                    active_public_key: None,
                    last_activity: Instant::now(),
                    generation: 0,
                    timer: None,
                }),
                signing: Arc::new(AsyncMutex::new(())),
            }),
        }
    }

    /// Configured inactivity timeout
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Decrypt the wallet for `public_key` and hold its signing key.
    ///
    /// On failure the session is left locked. Unlocking while already
    /// unlocked replaces the held key.
    pub fn unlock(&self, public_key: &Pubkey, password: &str) -> Result<()> {
        let keypair = {
            let mnemonic = self.inner.store.unlock_mnemonic(public_key, password)?;
            derive_keypair(&mnemonic, 0)?
        };
        if keypair.public_key() != *public_key {
            return Err(Error::KeyDerivation(format!(
                "stored phrase derives {} instead of {}",
                keypair.public_key(),
                public_key
            )));
        }

        let mut state = self.inner.state.lock();
        state.keypair = Some(keypair);
        state.active_public_key = Some(*public_key);
        self.reschedule(&mut state);
        info!("Session unlocked for {}", public_key);
        Ok(())
    }

    /// Drop the key immediately and cancel the timer
    pub fn lock(&self) {
        let mut state = self.inner.state.lock();
        if state.keypair.is_some() {
            info!("Session locked");
        }
        state.clear_key();
    }

    /// Lock and forget which wallet was active
    pub fn disconnect(&self) {
        let mut state = self.inner.state.lock();
        state.clear_key();
        state.active_public_key = None;
        info!("Session disconnected");
    }

    /// Bind the session to another wallet without unlocking it.
    ///
    /// Switching away from an unlocked wallet locks the session.
    pub fn select(&self, public_key: &Pubkey) {
        let mut state = self.inner.state.lock();
        if state.active_public_key.as_ref() != Some(public_key) {
            state.clear_key();
            state.active_public_key = Some(*public_key);
            debug!("Active wallet set to {}", public_key);
        }
    }

    /// Restart the inactivity countdown. No effect while locked.
    pub fn record_activity(&self) {
        let mut state = self.inner.state.lock();
        self.inner.enforce_deadline(&mut state);
        if state.keypair.is_some() {
            self.reschedule(&mut state);
        }
    }

    /// Whether no key material is held
    pub fn is_locked(&self) -> bool {
        let mut state = self.inner.state.lock();
        self.inner.enforce_deadline(&mut state);
        state.keypair.is_none()
    }

    /// Active wallet, locked or not
    pub fn active_public_key(&self) -> Option<Pubkey> {
        self.inner.state.lock().active_public_key
    }

    /// Current state
    pub fn status(&self) -> SessionStatus {
        let mut state = self.inner.state.lock();
        self.inner.enforce_deadline(&mut state);
        let locked = state.keypair.is_none();
        SessionStatus {
            locked,
            active_public_key: state.active_public_key,
            remaining_before_lock: (!locked)
                .then(|| self.inner.timeout.saturating_sub(state.last_activity.elapsed())),
        }
    }

    /// Serialise signing flows of this session. Hold the permit across
    /// build, sign and submit.
    pub async fn signing_permit(&self) -> OwnedMutexGuard<()> {
        self.inner.signing.clone().lock_owned().await
    }

    fn reschedule(&self, state: &mut SessionState) {
        state.generation = state.generation.wrapping_add(1);
        state.last_activity = Instant::now();
        state.timer = None;

        let generation = state.generation;
        let timeout = self.inner.timeout;
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let task = handle.spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(inner) = weak.upgrade() {
                    inner.expire_if_current(generation);
                }
            });
            state.timer = Some(TimerHandle { task });
        }
    }

    #[cfg(test)]
    fn holds_key_material(&self) -> bool {
        self.inner.state.lock().keypair.is_some()
    }
}

impl TransactionSigner for SessionGuard {
    fn public_key(&self) -> Result<Pubkey> {
        let mut state = self.inner.state.lock();
        self.inner.enforce_deadline(&mut state);
        state
            .keypair
            .as_ref()
            .map(SigningKeypair::public_key)
            .ok_or(Error::SessionLocked)
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        let mut state = self.inner.state.lock();
        self.inner.enforce_deadline(&mut state);
        state
            .keypair
            .as_ref()
            .map(|keypair| keypair.sign(message))
            .ok_or(Error::SessionLocked)
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryVaultRepository;
    use crate::security::VaultCipher;
    use nebula_core::random::{OsRandom, RandomSource};
    use nebula_core::verify;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn setup() -> (Arc<WalletVaultStore>, Pubkey) {
        let rng: Arc<dyn RandomSource> = Arc::new(OsRandom);
        let store = Arc::new(WalletVaultStore::new(
            Arc::new(InMemoryVaultRepository::new()),
            Arc::new(VaultCipher::insecure_for_tests(rng.clone(), 1_000)),
            rng,
        ));
        let summary = store.import(ABANDON, "Str0ngPass!23", "Main").unwrap();
        (store, summary.public_key)
    }

    #[test]
    fn test_starts_locked() {
        let (store, _) = setup();
        let session = SessionGuard::new(store);
        assert!(session.is_locked());
        assert!(matches!(session.public_key(), Err(Error::SessionLocked)));
        assert!(matches!(session.sign_message(b"x"), Err(Error::SessionLocked)));
    }

    #[test]
    fn test_unlock_sign_lock() {
        let (store, key) = setup();
        let session = SessionGuard::new(store);
        session.unlock(&key, "Str0ngPass!23").unwrap();
        assert!(!session.is_locked());
        assert_eq!(TransactionSigner::public_key(&session).unwrap(), key);

        let sig = session.sign_message(b"hello").unwrap();
        assert!(verify(&key, b"hello", &sig));

        session.lock();
        assert!(session.is_locked());
        assert!(!session.holds_key_material());
        assert_eq!(session.active_public_key(), Some(key));
        assert!(matches!(session.sign_message(b"hello"), Err(Error::SessionLocked)));
    }

    #[test]
    fn test_failed_unlock_stays_locked() {
        let (store, key) = setup();
        let session = SessionGuard::new(store);
        assert!(matches!(session.unlock(&key, "wrong"), Err(Error::DecryptionFailed)));
        assert!(session.is_locked());
        assert_eq!(session.active_public_key(), None);
    }

    #[test]
    fn test_disconnect_clears_identity() {
        let (store, key) = setup();
        let session = SessionGuard::new(store);
        session.unlock(&key, "Str0ngPass!23").unwrap();
        session.disconnect();
        assert!(session.is_locked());
        assert_eq!(session.active_public_key(), None);
    }

    #[test]
    fn test_select_other_wallet_locks() {
        let (store, key) = setup();
        let session = SessionGuard::new(store);
        session.unlock(&key, "Str0ngPass!23").unwrap();
        session.select(&key);
        assert!(!session.is_locked());
        let other = Pubkey::new_from_array([5u8; 32]);
        session.select(&other);
        assert!(session.is_locked());
        assert_eq!(session.active_public_key(), Some(other));
    }

    #[test]
    fn test_record_activity_while_locked_is_noop() {
        let (store, _) = setup();
        let session = SessionGuard::new(store);
        session.record_activity();
        assert!(session.is_locked());
        assert_eq!(session.status().remaining_before_lock, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_scenario() {
        let (store, key) = setup();
        let session = SessionGuard::new(store);
        session.unlock(&key, "Str0ngPass!23").unwrap();

        tokio::time::advance(Duration::from_secs(14 * 60)).await;
        assert!(!session.is_locked());
        session.record_activity();

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        assert!(!session.is_locked(), "activity at 14m keeps the session open at 20m");

        tokio::time::advance(Duration::from_secs(9 * 60)).await;
        assert!(session.is_locked(), "locked by 29m");
        assert!(matches!(session.sign_message(b"x"), Err(Error::SessionLocked)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_clears_key_without_access() {
        let (store, key) = setup();
        let session = SessionGuard::new(store);
        session.unlock(&key, "Str0ngPass!23").unwrap();

        tokio::time::sleep(DEFAULT_INACTIVITY_TIMEOUT + Duration::from_secs(1)).await;
        assert!(!session.holds_key_material());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_lock_relocked_session() {
        let (store, key) = setup();
        let session = SessionGuard::with_timeout(store, Duration::from_secs(60));
        session.unlock(&key, "Str0ngPass!23").unwrap();
        tokio::time::sleep(Duration::from_secs(50)).await;
        session.lock();
        session.unlock(&key, "Str0ngPass!23").unwrap();

        // First timer's deadline passes; the new unlock is still fresh
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(session.holds_key_material());
        assert!(!session.is_locked());

        let status = session.status();
        assert_eq!(status.remaining_before_lock, Some(Duration::from_secs(40)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signing_permit_serialises() {
        let (store, _) = setup();
        let session = SessionGuard::new(store);
        let permit = session.signing_permit().await;
        let other = session.clone();
        let waiter = tokio::spawn(async move {
            let _permit = other.signing_permit().await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(permit);
        waiter.await.unwrap();
    }
}
