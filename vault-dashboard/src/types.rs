//! Core value types shared across the dashboard.

use std::fmt;
use std::str::FromStr;

use ethers_core::abi::Token;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VaultError;

pub use ethers_core::types::{Address, U256};

/// Token identifier (chain-native 256-bit integer).
pub type TokenId = U256;

/// Width of an encrypted-value handle in bytes.
pub const HANDLE_LEN: usize = 32;

/// Opaque reference to an encrypted value held by a confidential contract.
///
/// A handle cannot be decrypted locally; it is only meaningful to the relayer.
/// The all-zero handle marks a value that was never assigned on-chain and is
/// treated as plaintext zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CiphertextHandle([u8; HANDLE_LEN]);

impl CiphertextHandle {
    /// Sentinel used when a handle could not be read.
    pub const ZERO: CiphertextHandle = CiphertextHandle([0u8; HANDLE_LEN]);

    pub const fn new(bytes: [u8; HANDLE_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a handle from a byte slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VaultError> {
        let array: [u8; HANDLE_LEN] = bytes.try_into().map_err(|_| {
            VaultError::InvalidInput(format!(
                "ciphertext handle must be {} bytes, got {}",
                HANDLE_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Parse a `0x`-prefixed (or bare) hex handle. Short values are left-padded.
    pub fn from_hex(value: &str) -> Result<Self, VaultError> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() > HANDLE_LEN * 2 {
            return Err(VaultError::InvalidInput(format!(
                "ciphertext handle too long: {} hex digits",
                digits.len()
            )));
        }
        let padded = format!("{:0>64}", digits);
        let bytes = hex::decode(&padded)
            .map_err(|e| VaultError::InvalidInput(format!("invalid handle hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Decode a handle returned by a contract read (`bytes32` or `uint256`).
    pub fn from_abi(token: &Token) -> Result<Self, VaultError> {
        match token {
            Token::FixedBytes(bytes) => Self::from_slice(bytes),
            Token::Uint(value) => {
                let mut bytes = [0u8; HANDLE_LEN];
                value.to_big_endian(&mut bytes);
                Ok(Self(bytes))
            }
            other => Err(VaultError::InvalidInput(format!(
                "expected a bytes32 handle, got {:?}",
                other
            ))),
        }
    }

    pub fn as_bytes(&self) -> &[u8; HANDLE_LEN] {
        &self.0
    }

    /// True when every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Lowercase `0x`-prefixed hex encoding.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Abbreviated form for display: `0x12345678…abcdef`.
    pub fn short(&self) -> String {
        let full = self.to_hex();
        format!("{}…{}", &full[..10], &full[full.len() - 6..])
    }
}

impl From<[u8; HANDLE_LEN]> for CiphertextHandle {
    fn from(bytes: [u8; HANDLE_LEN]) -> Self {
        Self(bytes)
    }
}

impl FromStr for CiphertextHandle {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({})", self.short())
    }
}

impl Serialize for CiphertextHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CiphertextHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}
