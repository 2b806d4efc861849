//! In-memory chain, wallet and relayer for exercising the vault dashboard
//! without a network.
//!
//! ```ignore
//! let chain = MockChain::new();
//! let alice = alice();
//! chain.mint_to(alice, 500);
//! let relayer = MockRelayer::new(chain.book());
//! let dashboard = VaultDashboard::new(mock_config(), chain.clone(), Arc::new(relayer))
//!     .with_writer(Arc::new(MockWallet::new(chain.clone(), alice)))
//!     .with_signer(Arc::new(MockSigner::new(alice)));
//! ```

mod book;
mod chain;
mod relayer;
mod wallet;

pub use book::PlaintextBook;
pub use chain::{BatchMode, MockChain, MOCK_CHAIN_ID, NFT_ADDRESS, TOKEN_ADDRESS};
pub use relayer::{authorization_message, MockRelayer};
pub use wallet::{MockSigner, MockWallet};

use vault_dashboard::{Address, VaultConfig};

pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

/// Configuration pointing at the mock contracts.
pub fn mock_config() -> VaultConfig {
    VaultConfig {
        chain_id: MOCK_CHAIN_ID,
        nft_address: NFT_ADDRESS,
        token_address: TOKEN_ADDRESS,
        ..VaultConfig::default()
    }
}
