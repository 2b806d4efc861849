//! Per-item busy flags around user actions.

use std::fmt;
use std::future::Future;

use tracing::debug;

use crate::reconcile::TokenFlag;
use crate::state::StateStore;
use crate::types::TokenId;

/// Identifies the item an action is running for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKey {
    Mint,
    DecryptBalance,
    Claim(TokenId),
    DecryptToken(TokenId),
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKey::Mint => f.write_str("mint"),
            OperationKey::DecryptBalance => f.write_str("decrypt-balance"),
            OperationKey::Claim(id) => write!(f, "claim#{}", id),
            OperationKey::DecryptToken(id) => write!(f, "decrypt#{}", id),
        }
    }
}

/// Sets a busy flag before an action starts and clears it when it settles.
///
/// Keys are independent: a claim on one token never blocks a decrypt on
/// another. Re-entry on the same key is not prevented here; callers check
/// [`OperationTracker::is_busy`] first.
#[derive(Clone, Debug)]
pub struct OperationTracker {
    state: StateStore,
}

impl OperationTracker {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    /// Run `action` with the flag for `key` raised.
    ///
    /// The flag is raised by this call, before the returned future is
    /// polled. It is lowered when the action settles, panics or is dropped
    /// unpolled.
    pub fn track<F, T, E>(&self, key: OperationKey, action: F) -> impl Future<Output = Result<T, E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let guard = self.begin(key);
        async move {
            let _guard = guard;
            action.await
        }
    }

    /// Raise the flag for `key`; it is lowered when the guard drops.
    pub fn begin(&self, key: OperationKey) -> BusyGuard {
        debug!(operation = %key, "operation started");
        set_flag(&self.state, key, true);
        BusyGuard {
            state: self.state.clone(),
            key,
        }
    }

    pub fn is_busy(&self, key: OperationKey) -> bool {
        let snapshot = self.state.snapshot();
        match key {
            OperationKey::Mint => snapshot.minting,
            OperationKey::DecryptBalance => snapshot.decrypting_balance,
            OperationKey::Claim(id) => snapshot.token(id).map(|t| t.claiming).unwrap_or(false),
            OperationKey::DecryptToken(id) => snapshot.token(id).map(|t| t.decrypting).unwrap_or(false),
        }
    }
}

/// Clears its operation's busy flag on drop.
#[must_use = "the busy flag is cleared as soon as the guard is dropped"]
pub struct BusyGuard {
    state: StateStore,
    key: OperationKey,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        set_flag(&self.state, self.key, false);
        debug!(operation = %self.key, "operation settled");
    }
}

fn set_flag(state: &StateStore, key: OperationKey, value: bool) {
    match key {
        OperationKey::Mint => state.set_minting(value),
        OperationKey::DecryptBalance => state.set_decrypting_balance(value),
        OperationKey::Claim(id) => state.set_token_flag(id, TokenFlag::Claiming, value),
        OperationKey::DecryptToken(id) => state.set_token_flag(id, TokenFlag::Decrypting, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::TokenFacts;
    use crate::error::VaultError;
    use crate::types::{CiphertextHandle, U256};

    fn store_with_tokens(ids: &[u64]) -> StateStore {
        let store = StateStore::new();
        let facts: Vec<TokenFacts> = ids
            .iter()
            .map(|id| TokenFacts {
                token_id: U256::from(*id),
                encrypted_allocation: CiphertextHandle::ZERO,
                claimed: false,
            })
            .collect();
        store.reconcile_tokens(&facts);
        store
    }

    #[tokio::test]
    async fn test_flag_visible_during_action_and_cleared_after() {
        let store = store_with_tokens(&[1]);
        let tracker = OperationTracker::new(store.clone());
        let key = OperationKey::Claim(U256::one());

        let seen = tracker
            .track(key, async {
                Ok::<_, VaultError>(store.token(U256::one()).unwrap().claiming)
            })
            .await
            .unwrap();

        assert!(seen);
        assert!(!tracker.is_busy(key));
    }

    #[tokio::test]
    async fn test_flag_cleared_when_action_fails() {
        let store = store_with_tokens(&[1]);
        let tracker = OperationTracker::new(store.clone());
        let key = OperationKey::DecryptToken(U256::one());

        let result: Result<(), VaultError> = tracker
            .track(key, async { Err(VaultError::DecryptionFailed("relayer timeout".into())) })
            .await;

        assert!(result.is_err());
        assert!(!store.token(U256::one()).unwrap().decrypting);
    }

    #[tokio::test]
    async fn test_flag_raised_on_invocation() {
        let store = StateStore::new();
        let tracker = OperationTracker::new(store.clone());

        let pending = tracker.track(OperationKey::Mint, async { Ok::<_, VaultError>(()) });
        assert!(store.snapshot().minting);

        pending.await.unwrap();
        assert!(!store.snapshot().minting);
    }

    #[test]
    fn test_unpolled_action_lowers_flag_when_dropped() {
        let store = store_with_tokens(&[7]);
        let tracker = OperationTracker::new(store.clone());
        let key = OperationKey::Claim(U256::from(7));

        let pending = tracker.track(key, async { Ok::<_, VaultError>(()) });
        assert!(tracker.is_busy(key));

        drop(pending);
        assert!(!tracker.is_busy(key));
    }

    #[test]
    fn test_guard_raises_and_lowers_flag() {
        let store = StateStore::new();
        let tracker = OperationTracker::new(store.clone());

        let guard = tracker.begin(OperationKey::DecryptBalance);
        assert!(store.snapshot().decrypting_balance);
        drop(guard);
        assert!(!store.snapshot().decrypting_balance);
    }

    #[tokio::test]
    async fn test_independent_keys_do_not_interact() {
        let store = store_with_tokens(&[1, 2]);
        let tracker = OperationTracker::new(store.clone());

        let claim = tracker.begin(OperationKey::Claim(U256::from(1)));
        let decrypt = tracker.begin(OperationKey::DecryptToken(U256::from(2)));
        assert!(tracker.is_busy(OperationKey::Claim(U256::from(1))));
        assert!(!tracker.is_busy(OperationKey::Claim(U256::from(2))));
        assert!(tracker.is_busy(OperationKey::DecryptToken(U256::from(2))));

        drop(claim);
        assert!(!tracker.is_busy(OperationKey::Claim(U256::from(1))));
        assert!(tracker.is_busy(OperationKey::DecryptToken(U256::from(2))));
        drop(decrypt);
        assert!(!tracker.is_busy(OperationKey::DecryptToken(U256::from(2))));
    }

    #[tokio::test]
    async fn test_flag_cleared_when_action_panics() {
        let store = StateStore::new();
        let tracker = OperationTracker::new(store.clone());

        let task = tokio::spawn({
            let tracker = tracker.clone();
            async move {
                tracker
                    .track(OperationKey::DecryptBalance, async {
                        if tracker.is_busy(OperationKey::DecryptBalance) {
                            panic!("signer crashed");
                        }
                        Ok::<(), VaultError>(())
                    })
                    .await
            }
        });

        assert!(task.await.is_err());
        assert!(!store.snapshot().decrypting_balance);
    }
}
