//! Error types for the vault dashboard.

use std::fmt;

use thiserror::Error;

use crate::types::TokenId;

/// User-triggered actions whose failures are reported as notices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Mint,
    Claim,
    DecryptToken,
    DecryptBalance,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::Mint => "Mint",
            ActionKind::Claim => "Claim",
            ActionKind::DecryptToken => "Decryption",
            ActionKind::DecryptBalance => "Balance decryption",
        };
        f.write_str(label)
    }
}

/// Aggregated error type for the dashboard core.
#[derive(Debug, Error)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════════════════════
    // CHAIN ERRORS
    // ═══════════════════════════════════════════════════════════════════════════════

    /// A read against the chain failed.
    #[error("chain read failed: {0}")]
    Rpc(String),

    /// A transaction reverted, was dropped, or could not be submitted.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// No transaction signer is attached.
    #[error("unable to access signer")]
    SignerUnavailable,

    /// The client does not offer the requested capability.
    #[error("not supported by this client: {0}")]
    Unsupported(String),

    // ═══════════════════════════════════════════════════════════════════════════════
    // DECRYPTION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════════

    /// No typed-data signer is available to authorize a decryption.
    #[error("decryption authorization unavailable: no typed-data signer")]
    AuthorizationUnavailable,

    /// The wallet owner declined the signature request.
    #[error("signature request rejected by user")]
    UserRejected,

    /// The relayer could not serve the decryption batch.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════════════════════
    // PRECONDITION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("contract addresses are not configured")]
    NotConfigured,

    #[error("wrong network: connected to chain {actual}, expected {expected}")]
    NetworkMismatch { expected: u64, actual: u64 },

    #[error("no wallet connected")]
    NotConnected,

    #[error("token {0} is not in the owned set")]
    UnknownToken(TokenId),

    #[error("no balance to decrypt yet")]
    NoBalance,

    // ═══════════════════════════════════════════════════════════════════════════════
    // INPUT / CONFIG ERRORS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Failure of a tracked user action; displays as the user-facing notice.
    #[error("{action} failed: {source}")]
    Action {
        action: ActionKind,
        #[source]
        source: Box<VaultError>,
    },
}

impl VaultError {
    /// Wrap `self` as the failure of `action`.
    pub fn for_action(self, action: ActionKind) -> Self {
        match self {
            already @ VaultError::Action { .. } => already,
            other => VaultError::Action {
                action,
                source: Box::new(other),
            },
        }
    }

    /// The innermost cause, unwrapping action notices.
    pub fn root(&self) -> &VaultError {
        match self {
            VaultError::Action { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<config::ConfigError> for VaultError {
    fn from(err: config::ConfigError) -> Self {
        VaultError::InvalidConfig(err.to_string())
    }
}
