//! Owned dashboard state.
//!
//! The store is the single holder of the live token and balance records.
//! Every mutation replaces a whole collection with the output of a
//! [`reconcile`](crate::reconcile) function; the lock is never held across an
//! await point, so updates between suspension points are atomic.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::details::TokenFacts;
use crate::reconcile::{self, BalanceRecord, TokenFlag, TokenRecord};
use crate::types::{Address, CiphertextHandle, TokenId};

/// Serializable view of everything the UI renders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub account: Option<Address>,
    pub tokens: Vec<TokenRecord>,
    pub balance: Option<BalanceRecord>,
    pub minting: bool,
    pub decrypting_balance: bool,
}

impl DashboardSnapshot {
    pub fn token(&self, token_id: TokenId) -> Option<&TokenRecord> {
        self.tokens.iter().find(|record| record.token_id == token_id)
    }
}

/// Shared handle to the dashboard state.
#[derive(Clone, Debug, Default)]
pub struct StateStore {
    inner: Arc<RwLock<DashboardSnapshot>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, DashboardSnapshot> {
        // A panicking writer cannot leave a half-applied update: every write is a
        // single assignment of an already computed value.
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DashboardSnapshot> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.read().clone()
    }

    pub fn account(&self) -> Option<Address> {
        self.read().account
    }

    pub fn tokens(&self) -> Vec<TokenRecord> {
        self.read().tokens.clone()
    }

    pub fn token(&self, token_id: TokenId) -> Option<TokenRecord> {
        self.read().token(token_id).cloned()
    }

    pub fn balance(&self) -> Option<BalanceRecord> {
        self.read().balance.clone()
    }

    /// Switch accounts. A different account starts from an empty state.
    pub fn set_account(&self, account: Option<Address>) {
        let mut state = self.write();
        if state.account != account {
            *state = DashboardSnapshot {
                account,
                ..DashboardSnapshot::default()
            };
        }
    }

    /// Replace the token collection with the reconciliation of `fresh`.
    pub fn reconcile_tokens(&self, fresh: &[TokenFacts]) -> Vec<TokenRecord> {
        let mut state = self.write();
        let next = reconcile::reconcile_tokens(&state.tokens, fresh);
        state.tokens = next.clone();
        next
    }

    /// Replace the balance record with the reconciliation of `fresh`.
    pub fn reconcile_balance(&self, fresh: CiphertextHandle) -> BalanceRecord {
        let mut state = self.write();
        let next = reconcile::reconcile_balance(state.balance.as_ref(), fresh);
        state.balance = Some(next.clone());
        next
    }

    pub fn clear_tokens(&self) {
        self.write().tokens = Vec::new();
    }

    pub fn clear_balance(&self) {
        self.write().balance = None;
    }

    pub fn apply_token_reveal(&self, token_id: TokenId, decrypted_from: CiphertextHandle, value: u128) {
        let mut state = self.write();
        state.tokens = reconcile::apply_token_reveal(&state.tokens, token_id, decrypted_from, value);
    }

    pub fn apply_balance_reveal(&self, decrypted_from: CiphertextHandle, value: u128) {
        let mut state = self.write();
        state.balance = reconcile::apply_balance_reveal(state.balance.as_ref(), decrypted_from, value);
    }

    pub(crate) fn set_token_flag(&self, token_id: TokenId, flag: TokenFlag, value: bool) {
        let mut state = self.write();
        state.tokens = reconcile::set_token_flag(&state.tokens, token_id, flag, value);
    }

    pub(crate) fn set_minting(&self, value: bool) {
        self.write().minting = value;
    }

    pub(crate) fn set_decrypting_balance(&self, value: bool) {
        self.write().decrypting_balance = value;
    }
}
