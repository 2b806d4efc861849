//! The dashboard facade: refresh cycles and user actions.

use std::future::Future;
use std::sync::Arc;

use ethers_core::abi::Token;
use tracing::{debug, info, instrument, warn};

use crate::chain::{ChainReader, ChainWriter, ReadCall, RelayerClient, TxReceipt, TypedDataSigner};
use crate::config::VaultConfig;
use crate::contracts::{nft, token};
use crate::decrypt::{parse_plaintext, DecryptionOrchestrator};
use crate::details::DetailFetcher;
use crate::error::{ActionKind, VaultError};
use crate::reconcile::{BalanceRecord, TokenRecord};
use crate::scanner::OwnershipScanner;
use crate::state::{DashboardSnapshot, StateStore};
use crate::tracker::{OperationKey, OperationTracker};
use crate::types::{Address, CiphertextHandle, TokenId};

/// Owns the live records for one connected account and runs every action
/// against them.
///
/// Refreshes never fail: per-item read problems degrade to defaults. Actions
/// return [`VaultError::Action`] whose `Display` is the notice shown to the
/// user.
pub struct VaultDashboard {
    config: VaultConfig,
    reader: Arc<dyn ChainReader>,
    writer: Option<Arc<dyn ChainWriter>>,
    signer: Option<Arc<dyn TypedDataSigner>>,
    decryptor: DecryptionOrchestrator,
    state: StateStore,
    tracker: OperationTracker,
}

impl VaultDashboard {
    pub fn new(config: VaultConfig, reader: Arc<dyn ChainReader>, relayer: Arc<dyn RelayerClient>) -> Self {
        let state = StateStore::new();
        let decryptor = DecryptionOrchestrator::new(relayer).with_validity_days(config.decrypt_validity_days);
        Self {
            config,
            reader,
            writer: None,
            signer: None,
            decryptor,
            tracker: OperationTracker::new(state.clone()),
            state,
        }
    }

    /// Attach the transaction signer. Its account becomes the connected account.
    pub fn with_writer(mut self, writer: Arc<dyn ChainWriter>) -> Self {
        self.state.set_account(Some(writer.account()));
        self.writer = Some(writer);
        self
    }

    /// Attach the typed-data signer used to authorize decryptions.
    pub fn with_signer(mut self, signer: Arc<dyn TypedDataSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_decryptor(mut self, decryptor: DecryptionOrchestrator) -> Self {
        self.decryptor = decryptor;
        self
    }

    /// Connect a read-only account. Switching accounts drops all records.
    pub fn connect(&self, account: Address) {
        self.state.set_account(Some(account));
    }

    pub fn disconnect(&self) {
        self.state.set_account(None);
    }

    pub fn account(&self) -> Option<Address> {
        self.state.account()
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.state.snapshot()
    }

    pub fn is_busy(&self, key: OperationKey) -> bool {
        self.tracker.is_busy(key)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // REFRESH
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Rediscover the tokens `account` owns and reconcile them into the store.
    #[instrument(skip(self))]
    pub async fn refresh_owned_tokens(&self, account: Address) -> Vec<TokenRecord> {
        self.state.set_account(Some(account));
        if !self.config.nft_configured() {
            self.state.clear_tokens();
            return Vec::new();
        }

        let nft_address = self.config.nft_address;
        let scanner = OwnershipScanner::new(self.reader.as_ref(), nft_address, self.config.batch_size)
            .with_scan_limit(self.config.scan_limit);
        let owned = scanner.discover(account, self.config.ownership_strategy).await;

        let fetcher = DetailFetcher::new(self.reader.as_ref(), nft_address, self.config.batch_size);
        let facts = fetcher.fetch(&owned).await;

        if self.state.account() != Some(account) {
            debug!("account changed during refresh, discarding results");
            return self.state.tokens();
        }

        let records = self.state.reconcile_tokens(&facts);
        info!(tokens = records.len(), "owned tokens refreshed");
        records
    }

    /// Re-read the confidential balance handle of `account`.
    ///
    /// A failed read clears the stored balance.
    #[instrument(skip(self))]
    pub async fn refresh_balance(&self, account: Address) -> Option<BalanceRecord> {
        self.state.set_account(Some(account));
        if !self.config.token_configured() {
            self.state.clear_balance();
            return None;
        }

        let call = ReadCall::new(
            self.config.token_address,
            token::CONFIDENTIAL_BALANCE_OF,
            vec![Token::Address(account)],
        );
        let handle = self
            .reader
            .read_value(&call)
            .await
            .and_then(|value| CiphertextHandle::from_abi(&value));

        if self.state.account() != Some(account) {
            debug!("account changed during balance refresh, discarding result");
            return self.state.balance();
        }

        match handle {
            Ok(handle) => Some(self.state.reconcile_balance(handle)),
            Err(e) => {
                warn!(error = %e, "failed to load balance");
                self.state.clear_balance();
                None
            }
        }
    }

    /// Refresh tokens and balance concurrently.
    pub async fn refresh_all(&self, account: Address) -> DashboardSnapshot {
        let (_tokens, _balance) = futures::join!(self.refresh_owned_tokens(account), self.refresh_balance(account));
        self.state.snapshot()
    }

    async fn refresh_connected(&self) {
        if let Some(account) = self.state.account() {
            self.refresh_all(account).await;
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ACTIONS
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Mint a new allocation NFT for the connected account.
    ///
    /// Like every action, the busy flag is raised by the call itself, before
    /// the returned future is first polled.
    pub fn mint(&self) -> impl Future<Output = Result<TxReceipt, VaultError>> + '_ {
        let ready = self.check_local();
        self.guarded(ActionKind::Mint, OperationKey::Mint, ready, move |_account| async move {
            let receipt = self.send(self.config.nft_address, nft::MINT, vec![]).await?;
            info!(tx = ?receipt.tx_hash, "mint confirmed");
            self.refresh_connected().await;
            Ok::<_, VaultError>(receipt)
        })
    }

    /// Claim the allocation of `token_id` into the confidential balance.
    pub fn claim(&self, token_id: TokenId) -> impl Future<Output = Result<TxReceipt, VaultError>> + '_ {
        let ready = self.check_local();
        self.guarded(ActionKind::Claim, OperationKey::Claim(token_id), ready, move |_account| async move {
            let receipt = self
                .send(self.config.nft_address, nft::CLAIM, vec![Token::Uint(token_id)])
                .await?;
            info!(%token_id, tx = ?receipt.tx_hash, "claim confirmed");
            self.refresh_connected().await;
            Ok::<_, VaultError>(receipt)
        })
    }

    /// Reveal the allocation hidden behind `token_id`.
    pub fn decrypt_token(&self, token_id: TokenId) -> impl Future<Output = Result<u128, VaultError>> + '_ {
        let ready = self
            .check_local()
            .and_then(|_| self.state.token(token_id).ok_or(VaultError::UnknownToken(token_id)));
        let key = OperationKey::DecryptToken(token_id);
        self.guarded(ActionKind::DecryptToken, key, ready, move |record| async move {
            let handle = record.encrypted_allocation;
            let value = self.reveal(self.config.nft_address, handle).await?;
            self.state.apply_token_reveal(token_id, handle, value);
            info!(%token_id, "allocation revealed");
            self.refresh_connected().await;
            Ok::<_, VaultError>(value)
        })
    }

    /// Reveal the connected account's confidential balance.
    pub fn decrypt_balance(&self) -> impl Future<Output = Result<u128, VaultError>> + '_ {
        let ready = self
            .check_local()
            .and_then(|_| self.state.balance().ok_or(VaultError::NoBalance));
        self.guarded(ActionKind::DecryptBalance, OperationKey::DecryptBalance, ready, move |balance| async move {
            let handle = balance.encrypted;
            let value = self.reveal(self.config.token_address, handle).await?;
            self.state.apply_balance_reveal(handle, value);
            info!("balance revealed");
            self.refresh_connected().await;
            Ok::<_, VaultError>(value)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Raise the flag for `key` now unless a local precondition already
    /// failed, then run the network check and `body` under it.
    ///
    /// Failures come back wrapped as the notice for `kind`.
    fn guarded<'a, R, T, B, Fut>(
        &'a self,
        kind: ActionKind,
        key: OperationKey,
        ready: Result<R, VaultError>,
        body: B,
    ) -> impl Future<Output = Result<T, VaultError>> + 'a
    where
        R: 'a,
        T: 'a,
        B: FnOnce(R) -> Fut + 'a,
        Fut: Future<Output = Result<T, VaultError>> + 'a,
    {
        let tracked = ready.map(move |input| {
            self.tracker.track(key, async move {
                self.check_network().await?;
                body(input).await
            })
        });

        async move {
            let result = match tracked {
                Ok(action) => action.await,
                Err(e) => Err(e),
            };
            result.map_err(|e| e.for_action(kind))
        }
    }

    /// Connected and configured. Needs no I/O.
    fn check_local(&self) -> Result<Address, VaultError> {
        let account = self.state.account().ok_or(VaultError::NotConnected)?;
        if !self.config.is_ready() {
            return Err(VaultError::NotConfigured);
        }
        Ok(account)
    }

    async fn check_network(&self) -> Result<(), VaultError> {
        let actual = self.reader.chain_id().await?;
        if actual != self.config.chain_id {
            return Err(VaultError::NetworkMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    async fn send(&self, target: Address, operation: &str, args: Vec<Token>) -> Result<TxReceipt, VaultError> {
        let writer = self.writer.as_ref().ok_or(VaultError::SignerUnavailable)?;
        let tx_hash = writer.submit_transaction(target, operation, args).await?;
        debug!(?tx_hash, operation, "transaction submitted");
        writer.await_confirmation(tx_hash).await
    }

    async fn reveal(&self, contract: Address, handle: CiphertextHandle) -> Result<u128, VaultError> {
        let plaintexts = self
            .decryptor
            .decrypt(contract, &[handle], self.signer.as_deref())
            .await?;
        let raw = plaintexts
            .get(&handle)
            .ok_or_else(|| VaultError::DecryptionFailed(format!("no plaintext for {}", handle.short())))?;
        parse_plaintext(raw)
    }
}
