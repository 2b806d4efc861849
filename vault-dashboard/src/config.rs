//! Configuration for the vault dashboard.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::batch::DEFAULT_GROUP_SIZE;
use crate::decrypt::DEFAULT_VALIDITY_DAYS;
use crate::error::VaultError;
use crate::scanner::{OwnershipStrategy, DEFAULT_SCAN_LIMIT};
use crate::types::Address;

/// Prefix of the environment variables that override file settings.
pub const ENV_PREFIX: &str = "VAULT";

/// Sepolia chain id.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Main configuration for the dashboard and the `vault` binary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Chain the contracts are deployed on. Actions refuse to run elsewhere.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Allocation NFT contract.
    #[serde(default)]
    pub nft_address: Address,

    /// Confidential token contract.
    #[serde(default)]
    pub token_address: Address,

    /// Relayer gateway endpoint.
    #[serde(default = "default_relayer_url")]
    pub relayer_url: String,

    /// Maximum reads per multicall group.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Highest token id an ownership scan reads.
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u64,

    #[serde(default)]
    pub ownership_strategy: OwnershipStrategy,

    /// Lifetime of a decryption authorization, in days.
    #[serde(default = "default_validity_days")]
    pub decrypt_validity_days: u32,

    /// Wallet key for the CLI signer. Never logged.
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
}

fn default_rpc_url() -> String {
    "https://ethereum-sepolia-rpc.publicnode.com".to_string()
}

fn default_chain_id() -> u64 {
    SEPOLIA_CHAIN_ID
}

fn default_relayer_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_GROUP_SIZE
}

fn default_scan_limit() -> u64 {
    DEFAULT_SCAN_LIMIT
}

fn default_validity_days() -> u32 {
    DEFAULT_VALIDITY_DAYS
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            nft_address: Address::zero(),
            token_address: Address::zero(),
            relayer_url: default_relayer_url(),
            batch_size: default_batch_size(),
            scan_limit: default_scan_limit(),
            ownership_strategy: OwnershipStrategy::default(),
            decrypt_validity_days: default_validity_days(),
            private_key: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════════

impl VaultConfig {
    /// Defaults, then the optional TOML file, then `VAULT_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, VaultError> {
        let file = path.map(|p| File::from(p).format(FileFormat::Toml).required(true));
        Self::layered(file, None)
    }

    /// Parse a TOML document on top of the defaults. Environment is ignored.
    pub fn from_toml_str(document: &str) -> Result<Self, VaultError> {
        let file = File::from_str(document, FileFormat::Toml);
        Self::layered(Some(file), Some(HashMap::new()))
    }

    /// Layer an explicit variable map instead of the process environment.
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self, VaultError> {
        Self::layered::<File<config::FileSourceString, FileFormat>>(None, Some(vars))
    }

    fn layered<F>(file: Option<F>, env: Option<HashMap<String, String>>) -> Result<Self, VaultError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let mut builder = Config::builder().add_source(Config::try_from(&VaultConfig::default())?);
        if let Some(file) = file {
            builder = builder.add_source(file);
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true).source(env));

        let config: VaultConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every refresh fail.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.batch_size == 0 {
            return Err(VaultError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.scan_limit == 0 {
            return Err(VaultError::InvalidConfig("scan_limit must be at least 1".into()));
        }
        if self.decrypt_validity_days == 0 {
            return Err(VaultError::InvalidConfig("decrypt_validity_days must be at least 1".into()));
        }
        Url::parse(&self.rpc_url)
            .map_err(|e| VaultError::InvalidConfig(format!("rpc_url {:?}: {}", self.rpc_url, e)))?;
        Url::parse(&self.relayer_url)
            .map_err(|e| VaultError::InvalidConfig(format!("relayer_url {:?}: {}", self.relayer_url, e)))?;
        Ok(())
    }

    pub fn nft_configured(&self) -> bool {
        !self.nft_address.is_zero()
    }

    pub fn token_configured(&self) -> bool {
        !self.token_address.is_zero()
    }

    /// Both contract addresses are set.
    pub fn is_ready(&self) -> bool {
        self.nft_configured() && self.token_configured()
    }
}
