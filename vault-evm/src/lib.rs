//! vault-evm
//!
//! ethers-based adapters for `vault-dashboard`:
//! - [`EvmReader`]: JSON-RPC reads, Multicall3 batching and `Transfer` log queries
//! - [`EvmWriter`]: local-key transaction submission with confirmation tracking
//! - [`WalletSigner`]: EIP-712 signing for decryption authorizations
//! - [`HttpRelayerClient`]: the relayer gateway over HTTP

pub mod abi;
pub mod error;
pub mod reader;
pub mod relayer;
pub mod signer;
pub mod writer;

pub use error::EvmAdapterError;
pub use reader::EvmReader;
pub use relayer::HttpRelayerClient;
pub use signer::WalletSigner;
pub use writer::{EvmWriter, DEFAULT_CONFIRMATIONS};
