//! vault-dashboard
//!
//! Ownership reconciliation and confidential decryption for allocation NFTs.
//!
//! # Architecture
//!
//! Each allocation NFT hides a token allocation behind a ciphertext handle.
//! The dashboard answers three questions for a connected account without any
//! indexing service:
//! - which NFTs does the account own right now ([`scanner`]),
//! - what handle and claimed flag does each one carry ([`details`]),
//! - what plaintext is behind a handle ([`decrypt`], through the relayer).
//!
//! Reads go through [`batch::ChunkedBatchReader`], which prefers multicall and
//! degrades to per-call reads group by group. Fresh facts are merged into the
//! live records by the pure functions in [`reconcile`], so a revealed value
//! survives a refresh as long as its ciphertext handle is unchanged.
//!
//! User actions (`mint`, `claim`, `decrypt_token`, `decrypt_balance`) are
//! wrapped by [`tracker::OperationTracker`], which raises a per-item busy flag
//! for the duration of the action and always lowers it afterwards.
//!
//! Chain, wallet and relayer access are traits ([`chain`]); `vault-evm`
//! provides the ethers-based implementations.

pub mod batch;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod dashboard;
pub mod decrypt;
pub mod details;
pub mod error;
pub mod reconcile;
pub mod scanner;
pub mod state;
pub mod tracker;
pub mod types;

pub use batch::{ChunkedBatchReader, DEFAULT_GROUP_SIZE};
pub use chain::{
    BatchAttempt, ChainReader, ChainWriter, HandleContractPair, ReadCall, ReadOutcome, RelayerClient,
    RelayerKeypair, TxReceipt, TypedDataSigner, UserDecryptRequest,
};
pub use config::VaultConfig;
pub use dashboard::VaultDashboard;
pub use decrypt::{parse_plaintext, DecryptionAuthorization, DecryptionOrchestrator, DEFAULT_VALIDITY_DAYS};
pub use details::{DetailFetcher, TokenFacts};
pub use error::{ActionKind, VaultError};
pub use reconcile::{BalanceRecord, TokenRecord};
pub use scanner::{OwnershipScanner, OwnershipStrategy, DEFAULT_SCAN_LIMIT};
pub use state::{DashboardSnapshot, StateStore};
pub use tracker::{BusyGuard, OperationKey, OperationTracker};
pub use types::{Address, CiphertextHandle, TokenId, U256};

/// Re-exported so adapters and tests build typed-data payloads and signatures
/// against the same `ethers-core` version.
pub use ethers_core;
