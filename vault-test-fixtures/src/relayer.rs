//! Mock relayer that decrypts from the shared [`PlaintextBook`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use vault_dashboard::chain::{RelayerClient, RelayerKeypair, UserDecryptRequest};
use vault_dashboard::ethers_core::types::transaction::eip712::TypedData;
use vault_dashboard::{Address, CiphertextHandle, VaultError};

use crate::book::PlaintextBook;
use crate::chain::MOCK_CHAIN_ID;

/// EIP-712 payload shaped like the relayer SDK's user-decrypt authorization.
pub fn authorization_message(
    public_key: &str,
    contract_addresses: &[Address],
    start_timestamp: &str,
    duration_days: &str,
) -> Result<TypedData, VaultError> {
    let contracts: Vec<String> = contract_addresses.iter().map(|a| format!("{:?}", a)).collect();
    let value = json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            "UserDecryptRequestVerification": [
                { "name": "publicKey", "type": "bytes" },
                { "name": "contractAddresses", "type": "address[]" },
                { "name": "startTimestamp", "type": "uint256" },
                { "name": "durationDays", "type": "uint256" },
                { "name": "extraData", "type": "bytes" }
            ]
        },
        "primaryType": "UserDecryptRequestVerification",
        "domain": {
            "name": "Decryption",
            "version": "1",
            "chainId": MOCK_CHAIN_ID,
            "verifyingContract": format!("{:?}", Address::repeat_byte(0xdc))
        },
        "message": {
            "publicKey": public_key,
            "contractAddresses": contracts,
            "startTimestamp": start_timestamp,
            "durationDays": duration_days,
            "extraData": "0x00"
        }
    });
    serde_json::from_value(value).map_err(|e| VaultError::InvalidInput(e.to_string()))
}

/// Relayer double with call counters and failure switches.
#[derive(Default)]
pub struct MockRelayer {
    book: PlaintextBook,
    keypairs: AtomicUsize,
    messages: AtomicUsize,
    requests: Mutex<Vec<UserDecryptRequest>>,
    unavailable: AtomicBool,
}

impl MockRelayer {
    pub fn new(book: PlaintextBook) -> Self {
        Self {
            book,
            ..Self::default()
        }
    }

    /// Fail every decryption request as a gateway outage would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn keypairs_generated(&self) -> usize {
        self.keypairs.load(Ordering::SeqCst)
    }

    pub fn messages_built(&self) -> usize {
        self.messages.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<UserDecryptRequest> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Total relayer round trips of any kind.
    pub fn total_calls(&self) -> usize {
        self.keypairs_generated() + self.messages_built() + self.requests().len()
    }
}

#[async_trait]
impl RelayerClient for MockRelayer {
    async fn generate_keypair(&self) -> Result<RelayerKeypair, VaultError> {
        let n = self.keypairs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RelayerKeypair {
            public_key: format!("0x{:064x}", n),
            private_key: format!("0x{:064x}", n + 1_000_000),
        })
    }

    async fn build_authorization_message(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: &str,
        duration_days: &str,
    ) -> Result<TypedData, VaultError> {
        self.messages.fetch_add(1, Ordering::SeqCst);
        authorization_message(public_key, contract_addresses, start_timestamp, duration_days)
    }

    async fn request_decryption(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<BTreeMap<CiphertextHandle, String>, VaultError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VaultError::DecryptionFailed("relayer responded 503".into()));
        }

        let mut plaintexts = BTreeMap::new();
        for pair in &request.handle_contract_pairs {
            if !request.contract_addresses.contains(&pair.contract_address) {
                return Err(VaultError::DecryptionFailed(format!(
                    "contract {:?} not covered by the authorization",
                    pair.contract_address
                )));
            }
            let value = self.book.get(&pair.handle).ok_or_else(|| {
                VaultError::DecryptionFailed(format!("handle {} is not decryptable by user", pair.handle.short()))
            })?;
            plaintexts.insert(pair.handle, value.to_string());
        }
        Ok(plaintexts)
    }
}
