//! Wallet-backed transaction submission.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::prelude::*;
use tracing::{debug, info};
use vault_dashboard::chain::{ChainWriter, TxReceipt};
use vault_dashboard::VaultError;

use crate::abi;
use crate::error::EvmAdapterError;

/// Number of blocks to wait on top of inclusion.
pub const DEFAULT_CONFIRMATIONS: usize = 1;

/// Signs with a local private key and broadcasts over HTTP JSON-RPC.
pub struct EvmWriter {
    client: Arc<SignerMiddleware<Provider<Http>, LocalWallet>>,
    confirmations: usize,
}

impl EvmWriter {
    pub fn new(rpc_url: &str, private_key: &str, chain_id: u64) -> Result<Self, EvmAdapterError> {
        let provider = Provider::<Http>::try_from(rpc_url).map_err(|e| EvmAdapterError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: e.to_string(),
        })?;

        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| EvmAdapterError::InvalidKey(e.to_string()))?
            .with_chain_id(chain_id);

        let client = SignerMiddleware::new(provider, wallet);
        info!(account = ?client.address(), chain_id, "EVM writer ready");

        Ok(Self {
            client: Arc::new(client),
            confirmations: DEFAULT_CONFIRMATIONS,
        })
    }

    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    pub fn confirmations(&self) -> usize {
        self.confirmations
    }

    async fn send(&self, target: Address, operation: &str, args: &[Token]) -> Result<H256, EvmAdapterError> {
        let calldata = abi::encode_call(operation, args)?;
        let tx = TransactionRequest::new().to(target).data(Bytes::from(calldata));

        debug!(?target, operation, "sending transaction");

        let pending_tx = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| EvmAdapterError::Send(e.to_string()))?;
        let tx_hash = pending_tx.tx_hash();

        info!(?tx_hash, operation, "transaction submitted");
        Ok(tx_hash)
    }

    async fn wait(&self, tx_hash: H256) -> Result<TxReceipt, EvmAdapterError> {
        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .confirmations(self.confirmations)
            .await?
            .ok_or(EvmAdapterError::Dropped(tx_hash))?;

        if receipt.status != Some(U64::one()) {
            return Err(EvmAdapterError::Reverted(tx_hash));
        }

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used,
        })
    }
}

#[async_trait]
impl ChainWriter for EvmWriter {
    fn account(&self) -> Address {
        self.client.address()
    }

    async fn submit_transaction(&self, target: Address, operation: &str, args: Vec<Token>) -> Result<H256, VaultError> {
        Ok(self.send(target, operation, &args).await?)
    }

    async fn await_confirmation(&self, tx_hash: H256) -> Result<TxReceipt, VaultError> {
        let receipt = self.wait(tx_hash).await?;
        info!(tx_hash = ?receipt.tx_hash, block = ?receipt.block_number, "transaction confirmed");
        Ok(receipt)
    }
}
