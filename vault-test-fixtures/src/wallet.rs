//! Mock transaction signer and typed-data signer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use vault_dashboard::chain::{ChainWriter, TxReceipt, TypedDataSigner};
use vault_dashboard::ethers_core::abi::Token;
use vault_dashboard::ethers_core::types::transaction::eip712::TypedData;
use vault_dashboard::ethers_core::types::{Signature, H256};
use vault_dashboard::{Address, VaultError, U256};

use crate::chain::MockChain;

struct PendingCall {
    operation: String,
    args: Vec<Token>,
}

/// Sends transactions to a [`MockChain`] as `account`.
///
/// Calls are executed when confirmation is awaited, the way a transaction only
/// takes effect once mined.
pub struct MockWallet {
    chain: Arc<MockChain>,
    account: Address,
    pending: Mutex<HashMap<H256, PendingCall>>,
    nonce: AtomicU64,
    revert_next: Mutex<Option<String>>,
    submitted: AtomicUsize,
}

impl MockWallet {
    pub fn new(chain: Arc<MockChain>, account: Address) -> Self {
        Self {
            chain,
            account,
            pending: Mutex::new(HashMap::new()),
            nonce: AtomicU64::new(0),
            revert_next: Mutex::new(None),
            submitted: AtomicUsize::new(0),
        }
    }

    /// Make the next confirmed transaction revert with `reason`.
    pub fn revert_next(&self, reason: &str) {
        *self.revert_next.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason.to_string());
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainWriter for MockWallet {
    fn account(&self) -> Address {
        self.account
    }

    async fn submit_transaction(&self, _target: Address, operation: &str, args: Vec<Token>) -> Result<H256, VaultError> {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let hash = H256::from_low_u64_be(nonce);
        self.pending.lock().unwrap_or_else(|p| p.into_inner()).insert(
            hash,
            PendingCall {
                operation: operation.to_string(),
                args,
            },
        );
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(hash)
    }

    async fn await_confirmation(&self, tx_hash: H256) -> Result<TxReceipt, VaultError> {
        let call = self
            .pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&tx_hash)
            .ok_or_else(|| VaultError::Transaction(format!("unknown transaction {:?}", tx_hash)))?;

        if let Some(reason) = self.revert_next.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(VaultError::Transaction(format!("execution reverted: {}", reason)));
        }

        self.chain.execute_write(self.account, &call.operation, &call.args)?;
        Ok(TxReceipt {
            tx_hash,
            block_number: Some(self.chain.total_minted()),
            gas_used: Some(U256::from(21_000u64)),
        })
    }
}

/// Typed-data signer that approves, rejects, or waits for a go-ahead.
pub struct MockSigner {
    account: Address,
    reject: bool,
    approval: Option<Arc<Notify>>,
    signatures: AtomicUsize,
}

impl MockSigner {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            reject: false,
            approval: None,
            signatures: AtomicUsize::new(0),
        }
    }

    /// A signer whose user declines every request.
    pub fn rejecting(account: Address) -> Self {
        Self {
            reject: true,
            ..Self::new(account)
        }
    }

    /// A signer that suspends until `approval` is notified.
    pub fn awaiting(account: Address, approval: Arc<Notify>) -> Self {
        Self {
            approval: Some(approval),
            ..Self::new(account)
        }
    }

    pub fn signatures(&self) -> usize {
        self.signatures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TypedDataSigner for MockSigner {
    fn address(&self) -> Address {
        self.account
    }

    async fn sign_typed_data(&self, _payload: &TypedData) -> Result<Signature, VaultError> {
        self.signatures.fetch_add(1, Ordering::SeqCst);
        if let Some(approval) = &self.approval {
            approval.notified().await;
        }
        if self.reject {
            return Err(VaultError::UserRejected);
        }
        Ok(Signature {
            r: U256::from_big_endian(self.account.as_bytes()),
            s: U256::from(7u64),
            v: 28,
        })
    }
}
