//! In-memory allocation NFT and confidential token.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use vault_dashboard::chain::{BatchAttempt, ChainReader, ReadCall, ReadOutcome};
use vault_dashboard::contracts::{nft, token};
use vault_dashboard::ethers_core::abi::Token;
use vault_dashboard::{Address, CiphertextHandle, TokenId, VaultError, U256};

use crate::book::PlaintextBook;

/// Address of the mock allocation NFT.
pub const NFT_ADDRESS: Address = Address::repeat_byte(0x4e);
/// Address of the mock confidential token.
pub const TOKEN_ADDRESS: Address = Address::repeat_byte(0x7c);
/// Chain id reported by default.
pub const MOCK_CHAIN_ID: u64 = 11_155_111;

/// How the mock answers multicall attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchMode {
    Supported,
    Unsupported,
    /// Every batch fails as a whole.
    Failing,
}

#[derive(Default)]
struct Ledger {
    owners: BTreeMap<u64, Address>,
    allocations: BTreeMap<u64, CiphertextHandle>,
    claimed: BTreeSet<u64>,
    balances: HashMap<Address, CiphertextHandle>,
    /// `(to, token id)` in emission order.
    transfers: Vec<(Address, u64)>,
    next_handle: u64,
}

#[derive(Default)]
struct Faults {
    /// `(operation, token id)`; `None` fails every call of the operation.
    reads: HashSet<(String, Option<u64>)>,
    logs_unavailable: bool,
    chain_id: Option<u64>,
}

#[derive(Default)]
struct Counters {
    reads: HashMap<String, usize>,
    batches: usize,
}

/// An in-memory chain hosting both contracts.
///
/// Allocation values are written into a [`PlaintextBook`] shared with
/// [`MockRelayer`](crate::MockRelayer), so decrypting a handle minted here
/// returns the value it was minted with.
pub struct MockChain {
    ledger: Mutex<Ledger>,
    faults: Mutex<Faults>,
    counters: Mutex<Counters>,
    batch_mode: Mutex<BatchMode>,
    book: PlaintextBook,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            faults: Mutex::new(Faults::default()),
            counters: Mutex::new(Counters::default()),
            batch_mode: Mutex::new(BatchMode::Supported),
            book: PlaintextBook::default(),
        }
    }
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn book(&self) -> PlaintextBook {
        self.book.clone()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // STATE SETUP
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Mint the next id to `owner` with a hidden `allocation`.
    pub fn mint_to(&self, owner: Address, allocation: u128) -> TokenId {
        let mut ledger = lock(&self.ledger);
        let id = ledger.owners.len() as u64 + 1;
        let handle = self.encrypt(&mut ledger, allocation);
        ledger.owners.insert(id, owner);
        ledger.allocations.insert(id, handle);
        ledger.transfers.push((owner, id));
        U256::from(id)
    }

    /// Mint a token whose allocation was never assigned (all-zero handle).
    pub fn mint_unassigned(&self, owner: Address) -> TokenId {
        let mut ledger = lock(&self.ledger);
        let id = ledger.owners.len() as u64 + 1;
        ledger.owners.insert(id, owner);
        ledger.allocations.insert(id, CiphertextHandle::ZERO);
        ledger.transfers.push((owner, id));
        U256::from(id)
    }

    pub fn transfer(&self, token_id: TokenId, to: Address) {
        let id = token_id.as_u64();
        let mut ledger = lock(&self.ledger);
        ledger.owners.insert(id, to);
        ledger.transfers.push((to, id));
    }

    /// Replace the allocation of `token_id` with a fresh ciphertext of `allocation`.
    pub fn reassign_allocation(&self, token_id: TokenId, allocation: u128) -> CiphertextHandle {
        let mut ledger = lock(&self.ledger);
        let handle = self.encrypt(&mut ledger, allocation);
        ledger.allocations.insert(token_id.as_u64(), handle);
        handle
    }

    /// Give `account` a fresh balance ciphertext of `amount`.
    pub fn set_balance(&self, account: Address, amount: u128) -> CiphertextHandle {
        let mut ledger = lock(&self.ledger);
        let handle = self.encrypt(&mut ledger, amount);
        ledger.balances.insert(account, handle);
        handle
    }

    pub fn allocation_handle(&self, token_id: TokenId) -> CiphertextHandle {
        lock(&self.ledger)
            .allocations
            .get(&token_id.as_u64())
            .copied()
            .unwrap_or(CiphertextHandle::ZERO)
    }

    pub fn balance_handle(&self, account: Address) -> CiphertextHandle {
        lock(&self.ledger)
            .balances
            .get(&account)
            .copied()
            .unwrap_or(CiphertextHandle::ZERO)
    }

    pub fn is_claimed(&self, token_id: TokenId) -> bool {
        lock(&self.ledger).claimed.contains(&token_id.as_u64())
    }

    pub fn total_minted(&self) -> u64 {
        lock(&self.ledger).owners.len() as u64
    }

    fn encrypt(&self, ledger: &mut Ledger, value: u128) -> CiphertextHandle {
        ledger.next_handle += 1;
        let mut bytes = [0u8; 32];
        bytes[0] = 0xc7;
        bytes[24..].copy_from_slice(&ledger.next_handle.to_be_bytes());
        let handle = CiphertextHandle::new(bytes);
        self.book.insert(handle, value);
        handle
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // FAULT INJECTION
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Fail every `operation` read for `token_id`, or for all ids when `None`.
    pub fn fail_read(&self, operation: &str, token_id: Option<u64>) {
        lock(&self.faults).reads.insert((operation.to_string(), token_id));
    }

    pub fn clear_faults(&self) {
        let mut faults = lock(&self.faults);
        faults.reads.clear();
        faults.logs_unavailable = false;
    }

    pub fn set_batch_mode(&self, mode: BatchMode) {
        *lock(&self.batch_mode) = mode;
    }

    pub fn set_logs_unavailable(&self, unavailable: bool) {
        lock(&self.faults).logs_unavailable = unavailable;
    }

    /// Report a different chain id than [`MOCK_CHAIN_ID`].
    pub fn set_chain_id(&self, chain_id: u64) {
        lock(&self.faults).chain_id = Some(chain_id);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // COUNTERS
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Calls of `operation` executed, inside batches or not.
    pub fn reads_of(&self, operation: &str) -> usize {
        lock(&self.counters).reads.get(operation).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        lock(&self.counters).reads.values().sum()
    }

    /// Batch attempts, whatever their outcome.
    pub fn batch_attempts(&self) -> usize {
        lock(&self.counters).batches
    }

    pub fn reset_counters(&self) {
        *lock(&self.counters) = Counters::default();
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CONTRACT LOGIC
    // ═══════════════════════════════════════════════════════════════════════════════

    fn execute_read(&self, call: &ReadCall) -> Result<Token, VaultError> {
        *lock(&self.counters).reads.entry(call.operation.clone()).or_default() += 1;

        let id = match call.args.first() {
            Some(Token::Uint(id)) => Some(id.as_u64()),
            _ => None,
        };
        {
            let faults = lock(&self.faults);
            if faults.reads.contains(&(call.operation.clone(), id))
                || faults.reads.contains(&(call.operation.clone(), None))
            {
                return Err(VaultError::Rpc(format!("{} reverted", call.operation)));
            }
        }

        let ledger = lock(&self.ledger);
        let nonexistent = || VaultError::Rpc("ERC721NonexistentToken".into());
        let operation = call.operation.as_str();
        if call.target == NFT_ADDRESS {
            match operation {
                nft::TOTAL_MINTED => return Ok(Token::Uint(U256::from(ledger.owners.len()))),
                nft::OWNER_OF => {
                    let owner = id.and_then(|id| ledger.owners.get(&id)).ok_or_else(nonexistent)?;
                    return Ok(Token::Address(*owner));
                }
                nft::ENCRYPTED_ALLOCATION => {
                    let handle = id.and_then(|id| ledger.allocations.get(&id)).ok_or_else(nonexistent)?;
                    return Ok(Token::FixedBytes(handle.as_bytes().to_vec()));
                }
                nft::IS_REWARD_CLAIMED => {
                    let id = id.filter(|id| ledger.owners.contains_key(id)).ok_or_else(nonexistent)?;
                    return Ok(Token::Bool(ledger.claimed.contains(&id)));
                }
                _ => {}
            }
        } else if call.target == TOKEN_ADDRESS && operation == token::CONFIDENTIAL_BALANCE_OF {
            let account = match call.args.first() {
                Some(Token::Address(account)) => *account,
                _ => return Err(VaultError::Rpc("bad confidentialBalanceOf argument".into())),
            };
            let handle = ledger.balances.get(&account).copied().unwrap_or(CiphertextHandle::ZERO);
            return Ok(Token::FixedBytes(handle.as_bytes().to_vec()));
        }
        Err(VaultError::Rpc(format!("no function {} on {:?}", operation, call.target)))
    }

    /// Execute a state-changing call from `sender`. Mirrors the contract reverts.
    pub(crate) fn execute_write(&self, sender: Address, operation: &str, args: &[Token]) -> Result<(), VaultError> {
        match operation {
            nft::MINT => {
                let allocation = 1_000 * (self.total_minted() as u128 + 1);
                self.mint_to(sender, allocation);
                Ok(())
            }
            nft::CLAIM => {
                let id = match args.first() {
                    Some(Token::Uint(id)) => id.as_u64(),
                    _ => return Err(VaultError::Transaction("mintToken expects a token id".into())),
                };
                let mut ledger = lock(&self.ledger);
                if ledger.owners.get(&id) != Some(&sender) {
                    return Err(VaultError::Transaction("execution reverted: not token owner".into()));
                }
                if ledger.claimed.contains(&id) {
                    return Err(VaultError::Transaction("execution reverted: reward already claimed".into()));
                }
                let allocation = ledger
                    .allocations
                    .get(&id)
                    .and_then(|handle| self.book.get(handle))
                    .unwrap_or(0);
                let current = ledger
                    .balances
                    .get(&sender)
                    .and_then(|handle| self.book.get(handle))
                    .unwrap_or(0);
                let handle = self.encrypt(&mut ledger, current + allocation);
                ledger.balances.insert(sender, handle);
                ledger.claimed.insert(id);
                Ok(())
            }
            other => Err(VaultError::Transaction(format!("unknown function {}", other))),
        }
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn chain_id(&self) -> Result<u64, VaultError> {
        Ok(lock(&self.faults).chain_id.unwrap_or(MOCK_CHAIN_ID))
    }

    async fn read_value(&self, call: &ReadCall) -> Result<Token, VaultError> {
        self.execute_read(call)
    }

    async fn batch_read(&self, calls: &[ReadCall]) -> BatchAttempt {
        lock(&self.counters).batches += 1;
        match *lock(&self.batch_mode) {
            BatchMode::Supported => {
                BatchAttempt::Completed(calls.iter().map(|call| ReadOutcome::from(self.execute_read(call))).collect())
            }
            BatchMode::Unsupported => BatchAttempt::Unsupported,
            BatchMode::Failing => BatchAttempt::Failed("multicall: execution reverted".into()),
        }
    }

    async fn incoming_transfers(&self, contract: Address, recipient: Address) -> Result<Vec<TokenId>, VaultError> {
        if lock(&self.faults).logs_unavailable {
            return Err(VaultError::Rpc("eth_getLogs: block range too large".into()));
        }
        if contract != NFT_ADDRESS {
            return Ok(Vec::new());
        }
        Ok(lock(&self.ledger)
            .transfers
            .iter()
            .filter(|(to, _)| *to == recipient)
            .map(|(_, id)| U256::from(*id))
            .collect())
    }
}
