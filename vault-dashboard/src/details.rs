//! Per-token detail reads: encrypted allocation handle and claimed flag.

use std::collections::BTreeSet;

use ethers_core::abi::Token;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::batch::ChunkedBatchReader;
use crate::chain::{ChainReader, ReadCall, ReadOutcome};
use crate::contracts::nft;
use crate::types::{Address, CiphertextHandle, TokenId};

/// Freshly read on-chain facts for one owned token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFacts {
    pub token_id: TokenId,
    pub encrypted_allocation: CiphertextHandle,
    pub claimed: bool,
}

/// Reads handle and claimed flag for owned ids in two independent batched passes.
///
/// A failed read never propagates: the handle falls back to
/// [`CiphertextHandle::ZERO`] and the flag to `false`.
pub struct DetailFetcher<'a> {
    batch: ChunkedBatchReader<'a>,
    nft: Address,
}

impl<'a> DetailFetcher<'a> {
    pub fn new(reader: &'a dyn ChainReader, nft: Address, group_size: usize) -> Self {
        Self {
            batch: ChunkedBatchReader::new(reader, group_size),
            nft,
        }
    }

    /// One [`TokenFacts`] per input id, in ascending id order.
    pub async fn fetch(&self, owned: &BTreeSet<TokenId>) -> Vec<TokenFacts> {
        if owned.is_empty() {
            return Vec::new();
        }
        let ids: Vec<TokenId> = owned.iter().copied().collect();

        let handle_calls: Vec<ReadCall> = ids
            .iter()
            .map(|id| ReadCall::for_token(self.nft, nft::ENCRYPTED_ALLOCATION, *id))
            .collect();
        let handles = self.batch.read_all(&handle_calls).await;

        let claimed_calls: Vec<ReadCall> = ids
            .iter()
            .map(|id| ReadCall::for_token(self.nft, nft::IS_REWARD_CLAIMED, *id))
            .collect();
        let claimed = self.batch.read_all(&claimed_calls).await;

        ids.into_iter()
            .zip(handles)
            .zip(claimed)
            .map(|((token_id, handle), claimed)| TokenFacts {
                token_id,
                encrypted_allocation: decode_handle(token_id, handle),
                claimed: decode_claimed(token_id, claimed),
            })
            .collect()
    }
}

/// Decode a handle read; any failure yields the zero sentinel.
fn decode_handle(token_id: TokenId, outcome: ReadOutcome) -> CiphertextHandle {
    match outcome {
        ReadOutcome::Success(token) => CiphertextHandle::from_abi(&token).unwrap_or_else(|e| {
            warn!(%token_id, error = %e, "malformed allocation handle");
            CiphertextHandle::ZERO
        }),
        ReadOutcome::Failure(cause) => {
            debug!(%token_id, %cause, "allocation handle read failed");
            CiphertextHandle::ZERO
        }
    }
}

fn decode_claimed(token_id: TokenId, outcome: ReadOutcome) -> bool {
    match outcome {
        ReadOutcome::Success(Token::Bool(claimed)) => claimed,
        ReadOutcome::Success(other) => {
            warn!(%token_id, ?other, "unexpected claimed flag type");
            false
        }
        ReadOutcome::Failure(cause) => {
            debug!(%token_id, %cause, "claimed flag read failed");
            false
        }
    }
}
