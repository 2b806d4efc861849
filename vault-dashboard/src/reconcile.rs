//! Merging fresh chain facts into the live token and balance records.
//!
//! Everything here is pure: previous records plus fresh facts in, new records
//! out. A revealed value survives a refresh only while the ciphertext handle it
//! was decrypted from is still the one on-chain.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::details::TokenFacts;
use crate::types::{CiphertextHandle, TokenId};

/// Live view of one owned allocation NFT.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token_id: TokenId,
    pub encrypted_allocation: CiphertextHandle,
    pub claimed: bool,
    /// Plaintext allocation, present only after a successful decrypt.
    pub revealed_allocation: Option<u128>,
    pub claiming: bool,
    pub decrypting: bool,
}

impl TokenRecord {
    /// A first sighting: nothing revealed, nothing in flight.
    pub fn from_facts(facts: &TokenFacts) -> Self {
        Self {
            token_id: facts.token_id,
            encrypted_allocation: facts.encrypted_allocation,
            claimed: facts.claimed,
            revealed_allocation: None,
            claiming: false,
            decrypting: false,
        }
    }

    pub fn short_handle(&self) -> String {
        self.encrypted_allocation.short()
    }
}

/// Confidential balance of the connected account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub encrypted: CiphertextHandle,
    pub revealed: Option<u128>,
}

/// In-flight flags carried by a [`TokenRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenFlag {
    Claiming,
    Decrypting,
}

/// Merge fresh facts with the previous collection.
///
/// - ids missing from `fresh` are dropped;
/// - handle and claimed flag always come from `fresh`;
/// - a revealed allocation is carried forward iff the handle is unchanged;
/// - in-flight flags are reset.
///
/// Output order follows `fresh`.
pub fn reconcile_tokens(previous: &[TokenRecord], fresh: &[TokenFacts]) -> Vec<TokenRecord> {
    let by_id: HashMap<TokenId, &TokenRecord> =
        previous.iter().map(|record| (record.token_id, record)).collect();

    fresh
        .iter()
        .map(|facts| {
            let mut record = TokenRecord::from_facts(facts);
            if let Some(prior) = by_id.get(&facts.token_id) {
                if prior.encrypted_allocation == facts.encrypted_allocation {
                    record.revealed_allocation = prior.revealed_allocation;
                }
            }
            record
        })
        .collect()
}

/// Merge a freshly read balance handle with the stored record.
pub fn reconcile_balance(previous: Option<&BalanceRecord>, fresh: CiphertextHandle) -> BalanceRecord {
    let revealed = previous
        .filter(|prior| prior.encrypted == fresh)
        .and_then(|prior| prior.revealed);
    BalanceRecord {
        encrypted: fresh,
        revealed,
    }
}

/// Attach a decrypted allocation to `token_id`.
///
/// Ignored when the record is gone or its handle no longer matches the one
/// that was decrypted.
pub fn apply_token_reveal(
    records: &[TokenRecord],
    token_id: TokenId,
    decrypted_from: CiphertextHandle,
    value: u128,
) -> Vec<TokenRecord> {
    records
        .iter()
        .map(|record| {
            if record.token_id == token_id && record.encrypted_allocation == decrypted_from {
                TokenRecord {
                    revealed_allocation: Some(value),
                    ..record.clone()
                }
            } else {
                record.clone()
            }
        })
        .collect()
}

/// Attach a decrypted balance, under the same handle-match rule as tokens.
pub fn apply_balance_reveal(
    previous: Option<&BalanceRecord>,
    decrypted_from: CiphertextHandle,
    value: u128,
) -> Option<BalanceRecord> {
    previous.map(|record| {
        if record.encrypted == decrypted_from {
            BalanceRecord {
                encrypted: record.encrypted,
                revealed: Some(value),
            }
        } else {
            record.clone()
        }
    })
}

/// Copy of `records` with one flag on one token set to `value`.
pub fn set_token_flag(records: &[TokenRecord], token_id: TokenId, flag: TokenFlag, value: bool) -> Vec<TokenRecord> {
    records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            if record.token_id == token_id {
                match flag {
                    TokenFlag::Claiming => record.claiming = value,
                    TokenFlag::Decrypting => record.decrypting = value,
                }
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::types::U256;

    fn handle(byte: u8) -> CiphertextHandle {
        CiphertextHandle::new([byte; 32])
    }

    fn facts(id: u64, h: u8, claimed: bool) -> TokenFacts {
        TokenFacts {
            token_id: U256::from(id),
            encrypted_allocation: handle(h),
            claimed,
        }
    }

    fn revealed(id: u64, h: u8, value: u128) -> TokenRecord {
        TokenRecord {
            revealed_allocation: Some(value),
            claiming: true,
            decrypting: true,
            ..TokenRecord::from_facts(&facts(id, h, false))
        }
    }

    #[test]
    fn test_first_sighting_has_nothing_revealed() {
        let records = reconcile_tokens(&[], &[facts(1, 7, false)]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].revealed_allocation, None);
        assert!(!records[0].claiming && !records[0].decrypting);
    }

    #[test]
    fn test_reveal_survives_unchanged_handle_and_flags_reset() {
        let records = reconcile_tokens(&[revealed(1, 7, 42)], &[facts(1, 7, true)]);
        assert_eq!(records[0].revealed_allocation, Some(42));
        assert!(records[0].claimed);
        assert!(!records[0].claiming);
        assert!(!records[0].decrypting);
    }

    #[test]
    fn test_changed_handle_clears_reveal() {
        let records = reconcile_tokens(&[revealed(1, 7, 42)], &[facts(1, 8, false)]);
        assert_eq!(records[0].revealed_allocation, None);
        assert_eq!(records[0].encrypted_allocation, handle(8));
    }

    #[test]
    fn test_transferred_away_tokens_are_dropped() {
        let previous = vec![revealed(1, 7, 42), revealed(2, 9, 5)];
        let records = reconcile_tokens(&previous, &[facts(2, 9, false)]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].token_id, U256::from(2));
        assert_eq!(records[0].revealed_allocation, Some(5));
    }

    #[test]
    fn test_balance_reconciliation() {
        let stored = BalanceRecord {
            encrypted: handle(3),
            revealed: Some(100),
        };
        assert_eq!(reconcile_balance(Some(&stored), handle(3)).revealed, Some(100));
        assert_eq!(reconcile_balance(Some(&stored), handle(4)).revealed, None);
        assert_eq!(reconcile_balance(None, handle(4)).revealed, None);
    }

    #[test]
    fn test_reveal_requires_matching_handle() {
        let records = reconcile_tokens(&[], &[facts(1, 7, false), facts(2, 8, false)]);

        let applied = apply_token_reveal(&records, U256::from(1), handle(7), 33);
        assert_eq!(applied[0].revealed_allocation, Some(33));
        assert_eq!(applied[1].revealed_allocation, None);

        let stale = apply_token_reveal(&records, U256::from(1), handle(9), 33);
        assert_eq!(stale, records);

        let balance = BalanceRecord {
            encrypted: handle(3),
            revealed: None,
        };
        assert_eq!(apply_balance_reveal(Some(&balance), handle(3), 8).unwrap().revealed, Some(8));
        assert_eq!(apply_balance_reveal(Some(&balance), handle(4), 8).unwrap().revealed, None);
        assert_eq!(apply_balance_reveal(None, handle(3), 8), None);
    }

    #[test]
    fn test_set_flag_touches_single_token() {
        let records = reconcile_tokens(&[], &[facts(1, 7, false), facts(2, 8, false)]);
        let flagged = set_token_flag(&records, U256::from(2), TokenFlag::Claiming, true);
        assert!(!flagged[0].claiming);
        assert!(flagged[1].claiming);
        assert!(!flagged[1].decrypting);
        assert!(!records[1].claiming);
    }

    proptest! {
        #[test]
        fn prop_reveal_preserved_iff_handle_unchanged(
            prev_handle in any::<u8>(),
            next_handle in any::<u8>(),
            value in any::<u128>(),
            claimed in any::<bool>(),
        ) {
            let records = reconcile_tokens(&[revealed(5, prev_handle, value)], &[facts(5, next_handle, claimed)]);
            let expected = if prev_handle == next_handle { Some(value) } else { None };
            prop_assert_eq!(records[0].revealed_allocation, expected);
            prop_assert_eq!(records[0].claimed, claimed);
            prop_assert!(!records[0].claiming && !records[0].decrypting);
        }

        #[test]
        fn prop_reconcile_is_idempotent(ids in proptest::collection::btree_set(1u64..500, 0..20)) {
            let fresh: Vec<TokenFacts> = ids.iter().map(|id| facts(*id, (*id % 251) as u8, id % 2 == 0)).collect();
            let once = reconcile_tokens(&[], &fresh);
            let twice = reconcile_tokens(&once, &fresh);
            prop_assert_eq!(once, twice);
        }
    }
}
