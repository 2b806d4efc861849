//! JSON-RPC chain reader with Multicall3 batching.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::contract::{BaseContract, Contract, Multicall};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use tracing::{debug, warn};
use vault_dashboard::chain::{BatchAttempt, ChainReader, ReadCall, ReadOutcome};
use vault_dashboard::contracts::nft;
use vault_dashboard::{TokenId, VaultError};

use crate::abi;
use crate::error::EvmAdapterError;

/// Reads contract state over HTTP JSON-RPC.
pub struct EvmReader {
    provider: Arc<Provider<Http>>,
    /// Multicall3 deployment; `None` uses the canonical address for the chain.
    multicall: Option<Address>,
    /// First block scanned for `Transfer` logs.
    logs_from_block: u64,
}

impl EvmReader {
    pub fn new(rpc_url: &str) -> Result<Self, EvmAdapterError> {
        let provider = Provider::<Http>::try_from(rpc_url).map_err(|e| EvmAdapterError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_provider(Arc::new(provider)))
    }

    pub fn from_provider(provider: Arc<Provider<Http>>) -> Self {
        Self {
            provider,
            multicall: None,
            logs_from_block: 0,
        }
    }

    pub fn with_multicall(mut self, address: Address) -> Self {
        self.multicall = Some(address);
        self
    }

    pub fn with_logs_from_block(mut self, block: u64) -> Self {
        self.logs_from_block = block;
        self
    }

    pub fn provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }

    async fn call(&self, call: &ReadCall) -> Result<Token, EvmAdapterError> {
        let calldata = abi::encode_call(&call.operation, &call.args)?;
        let tx: TypedTransaction = TransactionRequest::new().to(call.target).data(calldata).into();
        let output = self.provider.call(&tx, None).await?;
        abi::decode_single(&call.operation, &output)
    }

    async fn multicall(&self, calls: &[ReadCall]) -> Result<Option<Vec<ReadOutcome>>, EvmAdapterError> {
        let mut multicall = match Multicall::<Provider<Http>>::new(self.provider.clone(), self.multicall).await {
            Ok(multicall) => multicall,
            Err(e) => {
                debug!(error = %e, "multicall unavailable on this chain");
                return Ok(None);
            }
        };

        let base = BaseContract::from(abi::vault_abi()?.clone());
        for call in calls {
            let contract = Contract::<Provider<Http>>::new(call.target, base.clone(), self.provider.clone());
            let method = contract
                .method::<_, Token>(call.operation.as_str(), call.args.as_slice())
                .map_err(|e| EvmAdapterError::Abi(e.to_string()))?;
            multicall.add_call(method, true);
        }

        let results = multicall
            .call_raw()
            .await
            .map_err(|e| EvmAdapterError::Provider(e.to_string()))?;

        Ok(Some(
            results
                .into_iter()
                .map(|result| match result {
                    Ok(token) => ReadOutcome::Success(token),
                    Err(revert) => ReadOutcome::Failure(format!("reverted: 0x{}", hex::encode(&revert))),
                })
                .collect(),
        ))
    }
}

#[async_trait]
impl ChainReader for EvmReader {
    async fn chain_id(&self) -> Result<u64, VaultError> {
        let id = self.provider.get_chainid().await.map_err(EvmAdapterError::from)?;
        Ok(id.as_u64())
    }

    async fn read_value(&self, call: &ReadCall) -> Result<Token, VaultError> {
        Ok(self.call(call).await?)
    }

    async fn batch_read(&self, calls: &[ReadCall]) -> BatchAttempt {
        match self.multicall(calls).await {
            Ok(Some(outcomes)) => BatchAttempt::Completed(outcomes),
            Ok(None) => BatchAttempt::Unsupported,
            Err(e) => {
                warn!(error = %e, calls = calls.len(), "multicall failed");
                BatchAttempt::Failed(e.to_string())
            }
        }
    }

    async fn incoming_transfers(&self, contract: Address, recipient: Address) -> Result<Vec<TokenId>, VaultError> {
        let filter = Filter::new()
            .address(contract)
            .event(nft::TRANSFER_EVENT)
            .topic2(H256::from(recipient))
            .from_block(self.logs_from_block)
            .to_block(BlockNumber::Latest);

        let logs = self.provider.get_logs(&filter).await.map_err(EvmAdapterError::from)?;
        debug!(logs = logs.len(), "transfer logs fetched");

        Ok(logs
            .iter()
            .filter_map(|log| log.topics.get(3))
            .map(|topic| U256::from_big_endian(topic.as_bytes()))
            .collect())
    }
}
