//! User decryption through the relayer.
//!
//! Every non-trivial batch runs the full authorization protocol: fresh
//! keypair, validity window, EIP-712 signature, relayer request. Nothing is
//! cached between batches. All-zero handles never leave the process; they
//! decrypt to `"0"` by definition.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chain::{HandleContractPair, RelayerClient, RelayerKeypair, TypedDataSigner, UserDecryptRequest};
use crate::error::VaultError;
use crate::types::{Address, CiphertextHandle};

/// Authorization window length, in days.
pub const DEFAULT_VALIDITY_DAYS: u32 = 10;

/// Plaintext reported for an all-zero handle.
pub const ZERO_PLAINTEXT: &str = "0";

/// Source of the current unix time in seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Ephemeral material for one decryption batch. Dropped once the relayer answers.
#[derive(Clone, Debug)]
pub struct DecryptionAuthorization {
    pub keypair: RelayerKeypair,
    pub start_timestamp: String,
    pub duration_days: String,
    pub contract_addresses: Vec<Address>,
}

impl DecryptionAuthorization {
    fn new(keypair: RelayerKeypair, now: i64, validity_days: u32, contract: Address) -> Self {
        Self {
            keypair,
            start_timestamp: now.to_string(),
            duration_days: validity_days.to_string(),
            contract_addresses: vec![contract],
        }
    }
}

/// Runs the authorize-then-decrypt protocol for batches of handles.
#[derive(Clone)]
pub struct DecryptionOrchestrator {
    relayer: Arc<dyn RelayerClient>,
    validity_days: u32,
    clock: Clock,
}

impl DecryptionOrchestrator {
    pub fn new(relayer: Arc<dyn RelayerClient>) -> Self {
        Self {
            relayer,
            validity_days: DEFAULT_VALIDITY_DAYS,
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn validity_days(&self) -> u32 {
        self.validity_days
    }

    /// Decrypt `handles` held by `contract`.
    ///
    /// Returns one plaintext per distinct input handle or fails as a whole.
    /// A batch of only zero handles succeeds without a signer.
    pub async fn decrypt(
        &self,
        contract: Address,
        handles: &[CiphertextHandle],
        signer: Option<&dyn TypedDataSigner>,
    ) -> Result<BTreeMap<CiphertextHandle, String>, VaultError> {
        let unique: BTreeSet<CiphertextHandle> = handles.iter().copied().collect();
        let (zero, pending): (Vec<CiphertextHandle>, Vec<CiphertextHandle>) =
            unique.into_iter().partition(CiphertextHandle::is_zero);

        let mut plaintexts: BTreeMap<CiphertextHandle, String> = zero
            .into_iter()
            .map(|handle| (handle, ZERO_PLAINTEXT.to_string()))
            .collect();

        if pending.is_empty() {
            debug!("only zero handles, skipping relayer");
            return Ok(plaintexts);
        }

        let signer = signer.ok_or(VaultError::AuthorizationUnavailable)?;
        let decrypted = self.authorize_and_decrypt(contract, &pending, signer).await?;

        for handle in pending {
            match decrypted.get(&handle) {
                Some(value) => {
                    plaintexts.insert(handle, value.clone());
                }
                None => {
                    warn!(handle = %handle.short(), "relayer response is missing a handle");
                    return Err(VaultError::DecryptionFailed(format!(
                        "relayer returned no plaintext for {}",
                        handle.short()
                    )));
                }
            }
        }

        Ok(plaintexts)
    }

    async fn authorize_and_decrypt(
        &self,
        contract: Address,
        pending: &[CiphertextHandle],
        signer: &dyn TypedDataSigner,
    ) -> Result<BTreeMap<CiphertextHandle, String>, VaultError> {
        let keypair = self.relayer.generate_keypair().await.map_err(as_decryption_failure)?;
        let auth = DecryptionAuthorization::new(keypair, (self.clock)(), self.validity_days, contract);

        let message = self
            .relayer
            .build_authorization_message(
                &auth.keypair.public_key,
                &auth.contract_addresses,
                &auth.start_timestamp,
                &auth.duration_days,
            )
            .await
            .map_err(as_decryption_failure)?;

        // Suspends until the wallet owner answers. Rejection propagates as is.
        let signature = signer.sign_typed_data(&message).await?;

        let request = UserDecryptRequest {
            handle_contract_pairs: pending
                .iter()
                .map(|handle| HandleContractPair {
                    handle: *handle,
                    contract_address: contract,
                })
                .collect(),
            private_key: auth.keypair.private_key.clone(),
            public_key: auth.keypair.public_key.clone(),
            signature: hex::encode(signature.to_vec()),
            contract_addresses: auth.contract_addresses.clone(),
            user_address: signer.address(),
            start_timestamp: auth.start_timestamp.clone(),
            duration_days: auth.duration_days.clone(),
        };

        info!(handles = pending.len(), %contract, "requesting user decryption");
        self.relayer
            .request_decryption(&request)
            .await
            .map_err(as_decryption_failure)
    }
}

fn as_decryption_failure(err: VaultError) -> VaultError {
    match err {
        already @ VaultError::DecryptionFailed(_) => already,
        other => VaultError::DecryptionFailed(other.to_string()),
    }
}

/// Parse a relayer plaintext (unsigned decimal) into a value.
pub fn parse_plaintext(raw: &str) -> Result<u128, VaultError> {
    raw.trim()
        .parse::<u128>()
        .map_err(|e| VaultError::DecryptionFailed(format!("unparsable plaintext {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use ethers_core::types::transaction::eip712::TypedData;
    use ethers_core::types::{Signature, U256};
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingRelayer {
        calls: Mutex<Vec<&'static str>>,
        requests: Mutex<Vec<UserDecryptRequest>>,
        fail_request: bool,
        drop_handles: bool,
    }

    fn typed_data() -> TypedData {
        serde_json::from_value(json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" }
                ],
                "UserDecryptRequestVerification": [
                    { "name": "publicKey", "type": "bytes" },
                    { "name": "startTimestamp", "type": "uint256" },
                    { "name": "durationDays", "type": "uint256" }
                ]
            },
            "primaryType": "UserDecryptRequestVerification",
            "domain": { "name": "Decryption", "version": "1", "chainId": 11155111 },
            "message": { "publicKey": "0x01", "startTimestamp": "1", "durationDays": "10" }
        }))
        .unwrap()
    }

    #[async_trait]
    impl RelayerClient for RecordingRelayer {
        async fn generate_keypair(&self) -> Result<RelayerKeypair, VaultError> {
            self.calls.lock().unwrap().push("keypair");
            Ok(RelayerKeypair {
                public_key: "0xpub".into(),
                private_key: "0xpriv".into(),
            })
        }

        async fn build_authorization_message(
            &self,
            _public_key: &str,
            _contract_addresses: &[Address],
            _start_timestamp: &str,
            _duration_days: &str,
        ) -> Result<TypedData, VaultError> {
            self.calls.lock().unwrap().push("eip712");
            Ok(typed_data())
        }

        async fn request_decryption(
            &self,
            request: &UserDecryptRequest,
        ) -> Result<BTreeMap<CiphertextHandle, String>, VaultError> {
            self.calls.lock().unwrap().push("user-decrypt");
            self.requests.lock().unwrap().push(request.clone());
            if self.fail_request {
                return Err(VaultError::Rpc("gateway timeout".into()));
            }
            if self.drop_handles {
                return Ok(BTreeMap::new());
            }
            Ok(request
                .handle_contract_pairs
                .iter()
                .map(|pair| (pair.handle, "1234".to_string()))
                .collect())
        }
    }

    struct StaticSigner {
        reject: bool,
        signatures: Mutex<u32>,
    }

    impl StaticSigner {
        fn new(reject: bool) -> Self {
            Self {
                reject,
                signatures: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl TypedDataSigner for StaticSigner {
        fn address(&self) -> Address {
            Address::repeat_byte(0xa1)
        }

        async fn sign_typed_data(&self, _payload: &TypedData) -> Result<Signature, VaultError> {
            *self.signatures.lock().unwrap() += 1;
            if self.reject {
                return Err(VaultError::UserRejected);
            }
            Ok(Signature {
                r: U256::from(1),
                s: U256::from(2),
                v: 27,
            })
        }
    }

    fn orchestrator(relayer: Arc<RecordingRelayer>) -> DecryptionOrchestrator {
        DecryptionOrchestrator::new(relayer).with_clock(Arc::new(|| 1_700_000_000))
    }

    fn deadbeef() -> CiphertextHandle {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        CiphertextHandle::new(bytes)
    }

    #[tokio::test]
    async fn test_zero_handle_short_circuits() {
        let relayer = Arc::new(RecordingRelayer::default());
        let result = orchestrator(relayer.clone())
            .decrypt(Address::repeat_byte(0x11), &[CiphertextHandle::ZERO], None)
            .await
            .unwrap();

        assert_eq!(result.get(&CiphertextHandle::ZERO).map(String::as_str), Some("0"));
        assert!(relayer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_handle_runs_full_protocol_once() {
        let relayer = Arc::new(RecordingRelayer::default());
        let signer = StaticSigner::new(false);
        let contract = Address::repeat_byte(0x11);

        let result = orchestrator(relayer.clone())
            .decrypt(contract, &[deadbeef(), CiphertextHandle::ZERO, deadbeef()], Some(&signer))
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[&deadbeef()], "1234");
        assert_eq!(result[&CiphertextHandle::ZERO], "0");
        assert_eq!(*relayer.calls.lock().unwrap(), vec!["keypair", "eip712", "user-decrypt"]);
        assert_eq!(*signer.signatures.lock().unwrap(), 1);

        let requests = relayer.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.handle_contract_pairs.len(), 1);
        assert_eq!(request.contract_addresses, vec![contract]);
        assert_eq!(request.start_timestamp, "1700000000");
        assert_eq!(request.duration_days, "10");
        assert_eq!(request.user_address, signer.address());
        assert!(!request.signature.starts_with("0x"));
        assert_eq!(request.signature.len(), 130);
    }

    #[tokio::test]
    async fn test_missing_signer_is_authorization_unavailable() {
        let relayer = Arc::new(RecordingRelayer::default());
        let err = orchestrator(relayer)
            .decrypt(Address::zero(), &[deadbeef()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::AuthorizationUnavailable));
    }

    #[tokio::test]
    async fn test_rejected_signature_skips_relayer_request() {
        let relayer = Arc::new(RecordingRelayer::default());
        let signer = StaticSigner::new(true);
        let err = orchestrator(relayer.clone())
            .decrypt(Address::zero(), &[deadbeef()], Some(&signer))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::UserRejected));
        assert!(relayer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relayer_failures_fail_the_whole_batch() {
        let signer = StaticSigner::new(false);

        let failing = Arc::new(RecordingRelayer {
            fail_request: true,
            ..Default::default()
        });
        let err = orchestrator(failing)
            .decrypt(Address::zero(), &[deadbeef(), CiphertextHandle::ZERO], Some(&signer))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailed(_)));

        let lossy = Arc::new(RecordingRelayer {
            drop_handles: true,
            ..Default::default()
        });
        let err = orchestrator(lossy)
            .decrypt(Address::zero(), &[deadbeef()], Some(&signer))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailed(_)));
    }

    #[test]
    fn test_parse_plaintext() {
        assert_eq!(parse_plaintext("0").unwrap(), 0);
        assert_eq!(parse_plaintext(" 1000000 ").unwrap(), 1_000_000);
        assert!(parse_plaintext("-1").is_err());
        assert!(parse_plaintext("0x10").is_err());
    }
}
