//! Ownership discovery without an indexer.
//!
//! Two strategies are available. `Scan` reads `ownerOf` for every id in
//! `1..=totalMinted`. `TransferLogs` collects candidate ids from `Transfer`
//! logs addressed to the account and confirms each one with `ownerOf`.
//! Both answer "which ids does the account own right now"; they differ only
//! in cost and in their reliance on log availability.

use std::collections::{BTreeSet, HashSet};

use ethers_core::abi::Token;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batch::ChunkedBatchReader;
use crate::chain::{ChainReader, ReadCall, ReadOutcome};
use crate::contracts::nft;
use crate::types::{Address, TokenId, U256};

/// Highest token id a `Scan` reads unless configured otherwise.
pub const DEFAULT_SCAN_LIMIT: u64 = 10_000;

/// How owned ids are discovered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipStrategy {
    /// Full `ownerOf` scan of the dense id space.
    #[default]
    Scan,
    /// `Transfer` log candidates, verified with `ownerOf`. Falls back to `Scan`
    /// when logs cannot be queried.
    TransferLogs,
}

/// Determines which token ids the current account owns.
pub struct OwnershipScanner<'a> {
    reader: &'a dyn ChainReader,
    batch: ChunkedBatchReader<'a>,
    nft: Address,
    limit: u64,
}

impl<'a> OwnershipScanner<'a> {
    pub fn new(reader: &'a dyn ChainReader, nft: Address, group_size: usize) -> Self {
        Self {
            reader,
            batch: ChunkedBatchReader::new(reader, group_size),
            nft,
            limit: DEFAULT_SCAN_LIMIT,
        }
    }

    /// Never scan past id `limit`. A limit of zero is treated as one.
    pub fn with_scan_limit(mut self, limit: u64) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Read the issued-token count. `None` when the read fails.
    pub async fn total_issued(&self) -> Option<U256> {
        let call = ReadCall::new(self.nft, nft::TOTAL_MINTED, vec![]);
        match self.reader.read_value(&call).await {
            Ok(Token::Uint(total)) => Some(total),
            Ok(other) => {
                warn!(?other, "totalMinted returned a non-integer");
                None
            }
            Err(e) => {
                warn!(error = %e, "failed to read totalMinted");
                None
            }
        }
    }

    /// Discover owned ids with the given strategy.
    pub async fn discover(&self, account: Address, strategy: OwnershipStrategy) -> BTreeSet<TokenId> {
        match strategy {
            OwnershipStrategy::Scan => {
                let total = self.total_issued().await;
                self.scan(account, total).await
            }
            OwnershipStrategy::TransferLogs => {
                match self.reader.incoming_transfers(self.nft, account).await {
                    Ok(candidates) => self.verify_candidates(account, candidates).await,
                    Err(e) => {
                        warn!(error = %e, "transfer log query failed, falling back to full scan");
                        let total = self.total_issued().await;
                        self.scan(account, total).await
                    }
                }
            }
        }
    }

    /// Owned ids among `1..=min(total, limit)`.
    ///
    /// A zero or unknown total returns immediately without any reads. Ids whose
    /// `ownerOf` read fails count as not owned for this cycle. Reads are built
    /// one group at a time, so a huge total never allocates more than a group.
    pub async fn scan(&self, account: Address, total: Option<U256>) -> BTreeSet<TokenId> {
        let total = match total {
            Some(total) if !total.is_zero() => total,
            _ => {
                debug!("no tokens issued, skipping ownership scan");
                return BTreeSet::new();
            }
        };

        let upper = if total > U256::from(self.limit) {
            warn!(%total, limit = self.limit, "issued count exceeds scan limit, higher ids are skipped");
            self.limit
        } else {
            total.low_u64()
        };

        let step = self.batch.group_size() as u64;
        let mut owned = BTreeSet::new();
        let mut start = 1u64;
        while start <= upper {
            let end = upper.min(start.saturating_add(step - 1));
            let ids: Vec<TokenId> = (start..=end).map(U256::from).collect();
            owned.extend(self.owned_among(account, &ids).await);
            start = match end.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }

        info!(scanned = upper, owned = owned.len(), "ownership scan complete");
        owned
    }

    async fn verify_candidates(&self, account: Address, candidates: Vec<TokenId>) -> BTreeSet<TokenId> {
        let mut seen = HashSet::new();
        let unique: Vec<TokenId> = candidates
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        if unique.is_empty() {
            return BTreeSet::new();
        }

        let owned = self.owned_among(account, &unique).await;
        info!(candidates = unique.len(), owned = owned.len(), "transfer log candidates verified");
        owned
    }

    async fn owned_among(&self, account: Address, ids: &[TokenId]) -> BTreeSet<TokenId> {
        let calls: Vec<ReadCall> = ids
            .iter()
            .map(|id| ReadCall::for_token(self.nft, nft::OWNER_OF, *id))
            .collect();
        let outcomes = self.batch.read_all(&calls).await;

        ids.iter()
            .zip(outcomes)
            .filter_map(|(id, outcome)| match outcome {
                // Addresses are compared as bytes, which is the case-insensitive
                // comparison of their hex forms.
                ReadOutcome::Success(Token::Address(owner)) if owner == account => Some(*id),
                ReadOutcome::Success(Token::Address(_)) => None,
                ReadOutcome::Success(other) => {
                    warn!(token_id = %id, ?other, "ownerOf returned a non-address");
                    None
                }
                ReadOutcome::Failure(cause) => {
                    debug!(token_id = %id, %cause, "ownerOf failed, treating as not owned");
                    None
                }
            })
            .collect()
    }
}
