//! Error types for the EVM and relayer adapters.

use ethers::types::H256;
use thiserror::Error;
use vault_dashboard::VaultError;

/// Errors raised by the adapters before they are folded into [`VaultError`].
#[derive(Debug, Error)]
pub enum EvmAdapterError {
    // ═══════════════════════════════════════════════════════════════════════════════
    // RPC / CONTRACT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("provider error: {0}")]
    Provider(String),

    #[error("unknown contract function: {0}")]
    UnknownFunction(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("contract call returned no value")]
    EmptyOutput,

    // ═══════════════════════════════════════════════════════════════════════════════
    // TRANSACTION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("failed to send transaction: {0}")]
    Send(String),

    #[error("transaction {0:?} reverted")]
    Reverted(H256),

    #[error("transaction {0:?} dropped from mempool")]
    Dropped(H256),

    // ═══════════════════════════════════════════════════════════════════════════════
    // WALLET ERRORS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),

    // ═══════════════════════════════════════════════════════════════════════════════
    // RELAYER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("relayer unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relayer returned {status}: {body}")]
    Relayer { status: u16, body: String },

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<ethers::abi::Error> for EvmAdapterError {
    fn from(err: ethers::abi::Error) -> Self {
        EvmAdapterError::Abi(err.to_string())
    }
}

impl From<ethers::providers::ProviderError> for EvmAdapterError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        EvmAdapterError::Provider(err.to_string())
    }
}

impl From<ethers::signers::WalletError> for EvmAdapterError {
    fn from(err: ethers::signers::WalletError) -> Self {
        EvmAdapterError::Signing(err.to_string())
    }
}

impl From<EvmAdapterError> for VaultError {
    fn from(err: EvmAdapterError) -> Self {
        match err {
            EvmAdapterError::Provider(_)
            | EvmAdapterError::UnknownFunction(_)
            | EvmAdapterError::Abi(_)
            | EvmAdapterError::EmptyOutput => VaultError::Rpc(err.to_string()),
            EvmAdapterError::Send(_) | EvmAdapterError::Reverted(_) | EvmAdapterError::Dropped(_) => {
                VaultError::Transaction(err.to_string())
            }
            EvmAdapterError::InvalidKey(_) | EvmAdapterError::InvalidUrl { .. } => {
                VaultError::InvalidConfig(err.to_string())
            }
            EvmAdapterError::Signing(_) => VaultError::InvalidInput(err.to_string()),
            EvmAdapterError::Http(_) | EvmAdapterError::Relayer { .. } => VaultError::DecryptionFailed(err.to_string()),
        }
    }
}
