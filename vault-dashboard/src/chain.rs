//! Capabilities consumed from the chain, the wallet and the relayer.
//!
//! The dashboard core never talks to a network directly. Concrete adapters
//! (JSON-RPC, multicall, local wallets, the relayer gateway) live in
//! `vault-evm`; tests use the in-memory implementations from
//! `vault-test-fixtures`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ethers_core::abi::Token;
use ethers_core::types::transaction::eip712::TypedData;
use ethers_core::types::{Signature, H256};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::types::{Address, CiphertextHandle, TokenId, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// READS
// ═══════════════════════════════════════════════════════════════════════════════

/// A single read-only contract call.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadCall {
    /// Contract being queried.
    pub target: Address,
    /// ABI function name.
    pub operation: String,
    /// ABI-encoded arguments.
    pub args: Vec<Token>,
}

impl ReadCall {
    pub fn new(target: Address, operation: impl Into<String>, args: Vec<Token>) -> Self {
        Self {
            target,
            operation: operation.into(),
            args,
        }
    }

    /// Shorthand for `operation(tokenId)` style calls.
    pub fn for_token(target: Address, operation: &str, token_id: TokenId) -> Self {
        Self::new(target, operation, vec![Token::Uint(token_id)])
    }
}

/// Outcome of one read inside a batch.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadOutcome {
    Success(Token),
    Failure(String),
}

impl ReadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReadOutcome::Success(_))
    }

    pub fn value(&self) -> Option<&Token> {
        match self {
            ReadOutcome::Success(token) => Some(token),
            ReadOutcome::Failure(_) => None,
        }
    }
}

impl From<Result<Token, VaultError>> for ReadOutcome {
    fn from(result: Result<Token, VaultError>) -> Self {
        match result {
            Ok(token) => ReadOutcome::Success(token),
            Err(e) => ReadOutcome::Failure(e.to_string()),
        }
    }
}

/// Result of attempting one batched (multicall) round.
///
/// The caller decides how to degrade: `Unsupported` and `Failed` both send the
/// group down the sequential path.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchAttempt {
    /// One outcome per input call, in input order.
    Completed(Vec<ReadOutcome>),
    /// The data source has no batching primitive.
    Unsupported,
    /// The batched call failed as a whole.
    Failed(String),
}

/// Read access to chain state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Chain id of the connected network.
    async fn chain_id(&self) -> Result<u64, VaultError>;

    /// Execute a single read.
    async fn read_value(&self, call: &ReadCall) -> Result<Token, VaultError>;

    /// Execute a group of reads in one round trip.
    async fn batch_read(&self, _calls: &[ReadCall]) -> BatchAttempt {
        BatchAttempt::Unsupported
    }

    /// Ids of every `Transfer` into `recipient` emitted by `contract`, oldest first.
    /// Duplicates are allowed.
    async fn incoming_transfers(
        &self,
        _contract: Address,
        _recipient: Address,
    ) -> Result<Vec<TokenId>, VaultError> {
        Err(VaultError::Unsupported("transfer log queries".into()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WRITES
// ═══════════════════════════════════════════════════════════════════════════════

/// Confirmation of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

/// State-changing access through the connected wallet.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Account that signs submitted transactions.
    fn account(&self) -> Address;

    /// Sign and broadcast a contract call; returns the transaction hash.
    async fn submit_transaction(
        &self,
        target: Address,
        operation: &str,
        args: Vec<Token>,
    ) -> Result<H256, VaultError>;

    /// Wait until the transaction is mined. A revert is an error.
    async fn await_confirmation(&self, tx_hash: H256) -> Result<TxReceipt, VaultError>;
}

/// Signs EIP-712 structured messages. May wait indefinitely on user approval.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Fails with [`VaultError::UserRejected`] when the user declines.
    async fn sign_typed_data(&self, payload: &TypedData) -> Result<Signature, VaultError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// RELAYER
// ═══════════════════════════════════════════════════════════════════════════════

/// Ephemeral keypair used for one user-decryption request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerKeypair {
    pub public_key: String,
    pub private_key: String,
}

/// A handle together with the contract that owns its ACL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleContractPair {
    pub handle: CiphertextHandle,
    pub contract_address: Address,
}

/// Full user-decryption request, as expected by the relayer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDecryptRequest {
    pub handle_contract_pairs: Vec<HandleContractPair>,
    pub private_key: String,
    pub public_key: String,
    /// Hex signature without the `0x` prefix.
    pub signature: String,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    pub start_timestamp: String,
    pub duration_days: String,
}

/// Remote decryption service.
#[async_trait]
pub trait RelayerClient: Send + Sync {
    async fn generate_keypair(&self) -> Result<RelayerKeypair, VaultError>;

    /// Build the EIP-712 message the wallet signs to authorize decryption.
    async fn build_authorization_message(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: &str,
        duration_days: &str,
    ) -> Result<TypedData, VaultError>;

    /// Returns the plaintext (decimal string) for each handle.
    async fn request_decryption(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<BTreeMap<CiphertextHandle, String>, VaultError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        let ok: ReadOutcome = Ok(Token::Bool(true)).into();
        assert_eq!(ok.value(), Some(&Token::Bool(true)));

        let failed: ReadOutcome = Err(VaultError::Rpc("timeout".into())).into();
        assert!(!failed.is_success());
        assert_eq!(failed, ReadOutcome::Failure("chain read failed: timeout".into()));
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = UserDecryptRequest {
            handle_contract_pairs: vec![HandleContractPair {
                handle: CiphertextHandle::from_hex("0x01").unwrap(),
                contract_address: Address::repeat_byte(0x11),
            }],
            private_key: "priv".into(),
            public_key: "pub".into(),
            signature: "ab".into(),
            contract_addresses: vec![Address::repeat_byte(0x11)],
            user_address: Address::repeat_byte(0x22),
            start_timestamp: "1700000000".into(),
            duration_days: "10".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("handleContractPairs").is_some());
        assert_eq!(json["durationDays"], "10");
        assert_eq!(
            json["handleContractPairs"][0]["contractAddress"],
            format!("{:?}", Address::repeat_byte(0x11))
        );
    }
}
