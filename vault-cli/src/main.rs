//! vault
//!
//! Operator commands for allocation NFTs and their confidential token:
//! print the configured contracts, mint, claim, and reveal allocations and
//! balances through the relayer.
//!
//! Configuration comes from `.env`, an optional TOML file (`--config`) and
//! `VAULT_*` variables, with the flags below taking precedence.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use vault_dashboard::contracts::nft;
use vault_dashboard::{
    Address, ChainReader, ChainWriter, OwnershipStrategy, ReadCall, TokenId, TokenRecord, VaultConfig, VaultDashboard,
    U256,
};
use vault_evm::{EvmReader, EvmWriter, HttpRelayerClient, WalletSigner};

const DEFAULT_LOG_FILTER: &str = "vault=info,vault_dashboard=info,vault_evm=info";

#[derive(Parser)]
#[command(
    name = "vault",
    about = "Mint, claim and decrypt confidential allocation NFTs"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,
    #[arg(long, global = true)]
    rpc_url: Option<String>,
    #[arg(long, global = true)]
    relayer_url: Option<String>,
    /// Allocation NFT contract.
    #[arg(long, global = true, value_parser = parse_address)]
    nft_address: Option<Address>,
    /// Confidential token contract.
    #[arg(long, global = true, value_parser = parse_address)]
    token_address: Option<Address>,
    /// How owned NFTs are discovered.
    #[arg(long, global = true, value_enum)]
    strategy: Option<Strategy>,
    /// Read-only account, used when no private key is configured.
    #[arg(long, global = true, value_parser = parse_address)]
    account: Option<Address>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configured contract addresses.
    Addresses,
    /// Mint a new allocation NFT to the wallet.
    Mint,
    /// Claim the confidential tokens granted by an NFT, then reveal the balance.
    Claim(TokenArgs),
    /// Reveal the allocation hidden in an NFT.
    Decrypt(TokenArgs),
    /// Show the confidential token balance.
    Balance(RevealArgs),
    /// List the NFTs the account owns.
    Tokens(TokensArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// `ownerOf` over every minted id.
    Scan,
    /// `Transfer` logs into the account, verified with `ownerOf`.
    TransferLogs,
}

impl From<Strategy> for OwnershipStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Scan => OwnershipStrategy::Scan,
            Strategy::TransferLogs => OwnershipStrategy::TransferLogs,
        }
    }
}

#[derive(Args)]
struct TokenArgs {
    #[arg(long)]
    token_id: u64,
}

#[derive(Args)]
struct RevealArgs {
    /// Decrypt through the relayer.
    #[arg(long)]
    reveal: bool,
}

#[derive(Args)]
struct TokensArgs {
    /// Decrypt every allocation through the relayer.
    #[arg(long)]
    reveal: bool,
    /// Print the dashboard snapshot as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_address(value: &str) -> Result<Address, String> {
    value
        .parse::<Address>()
        .map_err(|e| format!("invalid address {:?}: {}", value, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.global.json_logs);

    let config = load_config(&cli.global)?;
    debug!(chain_id = config.chain_id, rpc = %config.rpc_url, "configuration loaded");

    if let Commands::Addresses = cli.command {
        print_addresses(&config);
        return Ok(());
    }

    let session = Session::open(config, cli.global.account)?;
    match cli.command {
        Commands::Addresses => Ok(()),
        Commands::Mint => mint(&session).await,
        Commands::Claim(args) => claim(&session, U256::from(args.token_id)).await,
        Commands::Decrypt(args) => decrypt(&session, U256::from(args.token_id)).await,
        Commands::Balance(args) => balance(&session, args.reveal).await,
        Commands::Tokens(args) => tokens(&session, args).await,
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(global: &GlobalArgs) -> Result<VaultConfig> {
    let mut config = VaultConfig::load(global.config.as_deref()).context("failed to load configuration")?;
    apply_overrides(&mut config, global);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut VaultConfig, global: &GlobalArgs) {
    if let Some(url) = &global.rpc_url {
        config.rpc_url = url.clone();
    }
    if let Some(url) = &global.relayer_url {
        config.relayer_url = url.clone();
    }
    if let Some(address) = global.nft_address {
        config.nft_address = address;
    }
    if let Some(address) = global.token_address {
        config.token_address = address;
    }
    if let Some(strategy) = global.strategy {
        config.ownership_strategy = strategy.into();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// A dashboard wired to the configured chain, wallet and relayer.
struct Session {
    dashboard: VaultDashboard,
    reader: Arc<EvmReader>,
    account: Address,
}

impl Session {
    fn open(config: VaultConfig, read_only_account: Option<Address>) -> Result<Self> {
        let reader = Arc::new(EvmReader::new(&config.rpc_url).context("failed to create JSON-RPC provider")?);
        let relayer = Arc::new(HttpRelayerClient::new(&config.relayer_url).context("invalid relayer URL")?);
        let dashboard = VaultDashboard::new(config.clone(), reader.clone(), relayer);

        let (dashboard, account) = match config.private_key.as_deref() {
            Some(key) => {
                let writer = EvmWriter::new(&config.rpc_url, key, config.chain_id).context("invalid private key")?;
                let signer = WalletSigner::from_private_key(key).context("invalid private key")?;
                let account = writer.account();
                let dashboard = dashboard.with_writer(Arc::new(writer)).with_signer(Arc::new(signer));
                (dashboard, account)
            }
            None => {
                let account = read_only_account
                    .context("no wallet connected: set VAULT_PRIVATE_KEY or pass --account")?;
                dashboard.connect(account);
                (dashboard, account)
            }
        };

        info!(?account, "session opened");
        Ok(Self {
            dashboard,
            reader,
            account,
        })
    }

    fn config(&self) -> &VaultConfig {
        self.dashboard.config()
    }

    async fn total_minted(&self) -> Result<TokenId> {
        let call = ReadCall::new(self.config().nft_address, nft::TOTAL_MINTED, vec![]);
        let value = self.reader.read_value(&call).await?;
        value.into_uint().context("totalMinted returned a non-integer")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

fn print_addresses(config: &VaultConfig) {
    println!("Confidential token address: {}", describe_address(config.token_address));
    println!("Allocation NFT address    : {}", describe_address(config.nft_address));
}

async fn mint(session: &Session) -> Result<()> {
    let receipt = session.dashboard.mint().await?;
    let token_id = session.total_minted().await?;
    let allocation = session
        .dashboard
        .snapshot()
        .token(token_id)
        .map(|record| record.encrypted_allocation.to_hex())
        .unwrap_or_else(|| "unknown".into());

    println!("Mint transaction hash : {:?}", receipt.tx_hash);
    println!("Token id              : {}", token_id);
    println!("Encrypted allocation  : {}", allocation);
    println!("Gas used              : {}", describe_gas(receipt.gas_used));
    Ok(())
}

async fn claim(session: &Session, token_id: TokenId) -> Result<()> {
    let receipt = session.dashboard.claim(token_id).await?;
    println!("Claim transaction hash: {:?}", receipt.tx_hash);
    println!("Gas used              : {}", describe_gas(receipt.gas_used));

    let Some(balance) = session.dashboard.snapshot().balance else {
        bail!("failed to load the confidential balance after claiming");
    };
    println!("Encrypted balance     : {}", balance.encrypted.to_hex());
    match session.dashboard.decrypt_balance().await {
        Ok(value) => println!("Clear balance         : {}", value),
        Err(e) => {
            warn!(error = %e, "balance could not be revealed");
            println!("Clear balance         : unavailable ({})", e);
        }
    }
    Ok(())
}

async fn decrypt(session: &Session, token_id: TokenId) -> Result<()> {
    session.dashboard.refresh_owned_tokens(session.account).await;
    let value = session.dashboard.decrypt_token(token_id).await?;
    let record = session
        .dashboard
        .snapshot()
        .token(token_id)
        .cloned()
        .with_context(|| format!("token {} vanished after decryption", token_id))?;

    println!("Encrypted allocation  : {}", record.encrypted_allocation.to_hex());
    println!("Clear allocation      : {}", value);
    Ok(())
}

async fn balance(session: &Session, reveal: bool) -> Result<()> {
    let Some(balance) = session.dashboard.refresh_balance(session.account).await else {
        bail!("failed to load the confidential balance");
    };
    println!("Encrypted balance     : {}", balance.encrypted.to_hex());
    if reveal {
        let value = session.dashboard.decrypt_balance().await?;
        println!("Clear balance         : {}", value);
    }
    Ok(())
}

async fn tokens(session: &Session, args: TokensArgs) -> Result<()> {
    let snapshot = session.dashboard.refresh_all(session.account).await;

    if args.reveal {
        for record in &snapshot.tokens {
            if let Err(e) = session.dashboard.decrypt_token(record.token_id).await {
                warn!(token_id = %record.token_id, error = %e, "allocation could not be revealed");
            }
        }
    }

    let snapshot = session.dashboard.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if snapshot.tokens.is_empty() {
        println!("No allocation NFTs owned by {:?}", session.account);
    }
    for record in &snapshot.tokens {
        println!("{}", describe_token(record));
    }
    if let Some(balance) = &snapshot.balance {
        let clear = balance
            .revealed
            .map(|value| value.to_string())
            .unwrap_or_else(|| "hidden".into());
        println!("Balance {}  {}", balance.encrypted.to_hex(), clear);
    }
    Ok(())
}

fn describe_address(address: Address) -> String {
    if address.is_zero() {
        "(not configured)".to_string()
    } else {
        format!("{:?}", address)
    }
}

fn describe_gas(gas_used: Option<U256>) -> String {
    gas_used.map_or_else(|| "unknown".to_string(), |gas| gas.to_string())
}

fn describe_token(record: &TokenRecord) -> String {
    let status = if record.claimed { "claimed" } else { "unclaimed" };
    let clear = record
        .revealed_allocation
        .map(|value| value.to_string())
        .unwrap_or_else(|| "hidden".into());
    format!("#{:<6} {}  {:<9}  {}", record.token_id, record.short_handle(), status, clear)
}

#[cfg(test)]
mod tests {
    use vault_dashboard::CiphertextHandle;

    use super::*;

    #[test]
    fn test_parse_claim() {
        let cli = Cli::try_parse_from(["vault", "claim", "--token-id", "7"]).unwrap();
        match cli.command {
            Commands::Claim(args) => assert_eq!(args.token_id, 7),
            _ => panic!("expected claim"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vault",
            "tokens",
            "--reveal",
            "--strategy",
            "transfer-logs",
            "--nft-address",
            "0x4e4e4e4e4e4e4e4e4e4e4e4e4e4e4e4e4e4e4e4e",
        ])
        .unwrap();
        assert_eq!(cli.global.strategy, Some(Strategy::TransferLogs));
        assert_eq!(cli.global.nft_address, Some(Address::repeat_byte(0x4e)));
        match cli.command {
            Commands::Tokens(args) => assert!(args.reveal && !args.json),
            _ => panic!("expected tokens"),
        }
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Cli::try_parse_from(["vault", "addresses", "--token-address", "0x12"]).is_err());
    }

    #[test]
    fn test_claim_requires_token_id() {
        assert!(Cli::try_parse_from(["vault", "claim"]).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let cli = Cli::try_parse_from([
            "vault",
            "--rpc-url",
            "http://127.0.0.1:8545",
            "--token-address",
            "0x7c7c7c7c7c7c7c7c7c7c7c7c7c7c7c7c7c7c7c7c",
            "--strategy",
            "scan",
            "addresses",
        ])
        .unwrap();
        let mut config = VaultConfig {
            ownership_strategy: OwnershipStrategy::TransferLogs,
            ..VaultConfig::default()
        };
        apply_overrides(&mut config, &cli.global);

        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.token_address, Address::repeat_byte(0x7c));
        assert_eq!(config.ownership_strategy, OwnershipStrategy::Scan);
        assert!(config.nft_address.is_zero());
    }

    #[test]
    fn test_describe_token() {
        let record = TokenRecord {
            token_id: U256::from(3),
            encrypted_allocation: CiphertextHandle::from([0xab; 32]),
            claimed: true,
            revealed_allocation: Some(1_500),
            claiming: false,
            decrypting: false,
        };
        let line = describe_token(&record);
        assert!(line.starts_with("#3"));
        assert!(line.contains("claimed"));
        assert!(line.ends_with("1500"));
        assert_eq!(describe_address(Address::zero()), "(not configured)");
    }
}
