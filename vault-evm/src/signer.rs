//! EIP-712 signing with a local key.

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::transaction::eip712::TypedData;
use vault_dashboard::chain::TypedDataSigner;
use vault_dashboard::VaultError;

use crate::error::EvmAdapterError;

/// Signs decryption authorizations without user interaction.
#[derive(Clone, Debug)]
pub struct WalletSigner {
    wallet: LocalWallet,
}

impl WalletSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    pub fn from_private_key(private_key: &str) -> Result<Self, EvmAdapterError> {
        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| EvmAdapterError::InvalidKey(e.to_string()))?;
        Ok(Self::new(wallet))
    }
}

#[async_trait]
impl TypedDataSigner for WalletSigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn sign_typed_data(&self, payload: &TypedData) -> Result<Signature, VaultError> {
        let signature = self
            .wallet
            .sign_typed_data(payload)
            .await
            .map_err(EvmAdapterError::from)?;
        Ok(signature)
    }
}
