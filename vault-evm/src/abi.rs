//! Human-readable ABI of the allocation NFT and the confidential token.

use ethers::abi::{parse_abi, Abi, Function, Token};
use once_cell::sync::OnceCell;

use crate::error::EvmAdapterError;

/// Every function and event the adapters call. Names are unique across both
/// contracts, so one table serves both.
const SIGNATURES: &[&str] = &[
    "function totalMinted() view returns (uint256)",
    "function ownerOf(uint256 tokenId) view returns (address)",
    "function getEncryptedAllocation(uint256 tokenId) view returns (bytes32)",
    "function isRewardClaimed(uint256 tokenId) view returns (bool)",
    "function mint() returns (uint256)",
    "function mintToken(uint256 tokenId)",
    "function confidentialBalanceOf(address account) view returns (bytes32)",
    "event Transfer(address indexed from, address indexed to, uint256 indexed tokenId)",
];

static VAULT_ABI: OnceCell<Abi> = OnceCell::new();

pub fn vault_abi() -> Result<&'static Abi, EvmAdapterError> {
    VAULT_ABI.get_or_try_init(|| parse_abi(SIGNATURES).map_err(|e| EvmAdapterError::Abi(e.to_string())))
}

pub fn function(name: &str) -> Result<&'static Function, EvmAdapterError> {
    vault_abi()?
        .function(name)
        .map_err(|_| EvmAdapterError::UnknownFunction(name.to_string()))
}

/// Calldata for `name(args…)`.
pub fn encode_call(name: &str, args: &[Token]) -> Result<Vec<u8>, EvmAdapterError> {
    Ok(function(name)?.encode_input(args)?)
}

/// Decode the single return value of `name`.
pub fn decode_single(name: &str, output: &[u8]) -> Result<Token, EvmAdapterError> {
    let mut tokens = function(name)?.decode_output(output)?;
    match tokens.len() {
        0 => Err(EvmAdapterError::EmptyOutput),
        1 => Ok(tokens.remove(0)),
        _ => Ok(Token::Tuple(tokens)),
    }
}
