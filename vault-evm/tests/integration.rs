//! Adapter tests against a local fake relayer gateway.
//!
//! Tests marked `#[ignore]` need a live Sepolia endpoint in `VAULT_RPC_URL`:
//! ```sh
//! VAULT_RPC_URL=https://... cargo test -p vault-evm -- --ignored
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use ethers::types::transaction::eip712::{Eip712, TypedData};
use ethers::types::{Address, Signature, H256};
use serde::Deserialize;
use vault_dashboard::chain::{ChainReader, RelayerClient, RelayerKeypair, TypedDataSigner, UserDecryptRequest};
use vault_dashboard::contracts::nft;
use vault_dashboard::{CiphertextHandle, DecryptionOrchestrator, ReadCall, VaultDashboard, VaultError};
use vault_evm::{EvmReader, HttpRelayerClient, WalletSigner};
use vault_test_fixtures::{authorization_message, mock_config, MockChain, PlaintextBook, NFT_ADDRESS};

// Anvil's first default account.
const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const GATEWAY_PUBLIC_KEY: &str = "0x0a0b0c0d";

// ═══════════════════════════════════════════════════════════════════════════════
// FAKE GATEWAY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
struct Gateway {
    book: PlaintextBook,
    requests: Arc<Mutex<Vec<UserDecryptRequest>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationBody {
    public_key: String,
    contract_addresses: Vec<Address>,
    start_timestamp: String,
    duration_days: String,
}

async fn keypair() -> Json<RelayerKeypair> {
    Json(RelayerKeypair {
        public_key: GATEWAY_PUBLIC_KEY.into(),
        private_key: "0x01020304".into(),
    })
}

async fn eip712(Json(body): Json<AuthorizationBody>) -> Result<Json<TypedData>, StatusCode> {
    authorization_message(
        &body.public_key,
        &body.contract_addresses,
        &body.start_timestamp,
        &body.duration_days,
    )
    .map(Json)
    .map_err(|_| StatusCode::BAD_REQUEST)
}

async fn user_decrypt(
    State(gateway): State<Gateway>,
    Json(request): Json<UserDecryptRequest>,
) -> Result<Json<BTreeMap<CiphertextHandle, String>>, (StatusCode, String)> {
    let typed = authorization_message(
        &request.public_key,
        &request.contract_addresses,
        &request.start_timestamp,
        &request.duration_days,
    )
    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let digest = typed
        .encode_eip712()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let signature =
        Signature::from_str(&request.signature).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let signer = signature
        .recover(H256::from(digest))
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;
    if signer != request.user_address {
        return Err((StatusCode::UNAUTHORIZED, "signature does not match user".into()));
    }

    let mut plaintexts = BTreeMap::new();
    for pair in &request.handle_contract_pairs {
        let value = gateway
            .book
            .get(&pair.handle)
            .ok_or((StatusCode::NOT_FOUND, format!("unknown handle {}", pair.handle)))?;
        plaintexts.insert(pair.handle, value.to_string());
    }

    gateway.requests.lock().unwrap().push(request);
    Ok(Json(plaintexts))
}

fn gateway_router(gateway: Gateway) -> Router {
    Router::new()
        .route("/keypair", post(keypair))
        .route("/eip712", post(eip712))
        .route("/user-decrypt", post(user_decrypt))
        .with_state(gateway)
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ═══════════════════════════════════════════════════════════════════════════════
// RELAYER CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_keypair_and_authorization_round_trip() {
    let url = spawn(gateway_router(Gateway::default())).await;
    let client = HttpRelayerClient::new(&url).unwrap();

    let keypair = client.generate_keypair().await.unwrap();
    assert_eq!(keypair.public_key, GATEWAY_PUBLIC_KEY);

    let typed = client
        .build_authorization_message(&keypair.public_key, &[NFT_ADDRESS], "1700000000", "10")
        .await
        .unwrap();
    assert_eq!(typed.primary_type, "UserDecryptRequestVerification");
    assert_eq!(typed.message["durationDays"], "10");
}

#[tokio::test]
async fn test_gateway_error_becomes_decryption_failure() {
    let app = Router::new().route(
        "/keypair",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "gateway overloaded") }),
    );
    let url = spawn(app).await;
    let client = HttpRelayerClient::new(&url).unwrap();

    let err = client.generate_keypair().await.unwrap_err();
    assert!(matches!(err, VaultError::DecryptionFailed(_)));
    assert_eq!(
        err.to_string(),
        "decryption failed: relayer returned 503: gateway overloaded"
    );
}

#[tokio::test]
async fn test_unreachable_gateway() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpRelayerClient::new(&format!("http://{}", addr)).unwrap();
    let err = client.generate_keypair().await.unwrap_err();
    assert!(matches!(err, VaultError::DecryptionFailed(_)));
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNER
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_wallet_signature_recovers_to_signer() {
    let signer = WalletSigner::from_private_key(TEST_KEY).unwrap();
    let typed = authorization_message(GATEWAY_PUBLIC_KEY, &[NFT_ADDRESS], "1700000000", "10").unwrap();

    let signature = signer.sign_typed_data(&typed).await.unwrap();
    let digest = H256::from(typed.encode_eip712().unwrap());
    assert_eq!(signature.recover(digest).unwrap(), signer.address());
}

// ═══════════════════════════════════════════════════════════════════════════════
// END TO END
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_orchestrator_over_http() {
    let book = PlaintextBook::default();
    let handle = CiphertextHandle::from([0x42; 32]);
    book.insert(handle, 1_250);

    let gateway = Gateway {
        book,
        ..Gateway::default()
    };
    let requests = gateway.requests.clone();
    let url = spawn(gateway_router(gateway)).await;

    let signer = WalletSigner::from_private_key(TEST_KEY).unwrap();
    let orchestrator = DecryptionOrchestrator::new(Arc::new(HttpRelayerClient::new(&url).unwrap()))
        .with_clock(Arc::new(|| 1_700_000_000));

    let plaintexts = orchestrator
        .decrypt(NFT_ADDRESS, &[handle, handle, CiphertextHandle::ZERO], Some(&signer))
        .await
        .unwrap();
    assert_eq!(plaintexts[&handle], "1250");
    assert_eq!(plaintexts[&CiphertextHandle::ZERO], "0");

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.handle_contract_pairs.len(), 1);
    assert_eq!(request.start_timestamp, "1700000000");
    assert_eq!(request.duration_days, "10");
    assert!(!request.signature.starts_with("0x"));
    assert_eq!(request.user_address, signer.address());
}

#[tokio::test]
async fn test_dashboard_reveals_allocation_through_gateway() {
    let signer = WalletSigner::from_private_key(TEST_KEY).unwrap();
    let account = signer.address();

    let chain = MockChain::new();
    let token_id = chain.mint_to(account, 4_000);

    let url = spawn(gateway_router(Gateway {
        book: chain.book(),
        ..Gateway::default()
    }))
    .await;

    let dashboard = VaultDashboard::new(mock_config(), chain.clone(), Arc::new(HttpRelayerClient::new(&url).unwrap()))
        .with_signer(Arc::new(signer));
    dashboard.connect(account);
    dashboard.refresh_owned_tokens(account).await;

    assert_eq!(dashboard.decrypt_token(token_id).await.unwrap(), 4_000);
    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.token(token_id).unwrap().revealed_allocation, Some(4_000));
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIVE NETWORK
// ═══════════════════════════════════════════════════════════════════════════════

fn live_reader() -> EvmReader {
    let url = std::env::var("VAULT_RPC_URL").expect("VAULT_RPC_URL must be set");
    EvmReader::new(&url).unwrap()
}

#[tokio::test]
#[ignore]
async fn test_live_chain_id() {
    let chain_id = live_reader().chain_id().await.unwrap();
    assert_eq!(chain_id, vault_dashboard::config::SEPOLIA_CHAIN_ID);
}

#[tokio::test]
#[ignore]
async fn test_live_total_minted() {
    let nft_address: Address = std::env::var("VAULT_NFT_ADDRESS")
        .expect("VAULT_NFT_ADDRESS must be set")
        .parse()
        .unwrap();
    let token = live_reader()
        .read_value(&ReadCall::new(nft_address, nft::TOTAL_MINTED, vec![]))
        .await
        .unwrap();
    assert!(token.into_uint().is_some());
}
