use std::time::Duration;

use solana_sdk::hash::Hash;
use thiserror::Error;

/// Coarse classification of a [`RelayError`].
///
/// Callers that only care about "what went wrong" (retry or not, surface
/// to the user or not) match on this instead of on individual variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The relay connection could not be constructed.
    Init,
    /// The relay was reachable but rejected the request.
    Call,
    /// The relay could not be reached (HTTP / network failure).
    Transport,
    /// A local wait budget ran out; the relay-side outcome is unknown.
    Timeout,
    /// A transaction could not be encoded before sending.
    Serialization,
    /// The caller passed something invalid.
    Caller,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay connection could not be initialized: {0}")]
    Init(String),

    #[error("block-engine rejected `{method}`: {message}")]
    Call {
        method: &'static str,
        message: String,
    },

    #[error("No tip accounts available")]
    EmptyTipAccounts,

    #[error("unrecognized `{method}` response: {detail}")]
    UnknownShape {
        method: &'static str,
        detail: String,
    },

    #[error("transport error calling `{method}`: {message}")]
    Transport {
        method: &'static str,
        message: String,
    },

    #[error("gave up waiting after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Signing error: {0}")]
    Signing(#[from] solana_sdk::signer::SignerError),

    #[error("Transaction compilation error: {0}")]
    Compile(String),

    #[error("Transaction too large: {size} bytes (maximum: {max})")]
    TransactionTooLarge { size: usize, max: usize },

    #[error("Invalid tip amount: {0} lamports (minimum: {1})")]
    InvalidTipAmount(u64, u64),

    #[error("bundle holds {count} transactions (allowed: 1..={max})")]
    BundleSize { count: usize, max: usize },

    #[error("transaction {index} uses blockhash {found}, bundle uses {expected}")]
    BlockhashMismatch {
        index: usize,
        expected: Hash,
        found: Hash,
    },

    #[error("a tracking session for bundle {0} is already active")]
    SessionActive(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Init(_) => ErrorKind::Init,
            Self::Call { .. } | Self::EmptyTipAccounts | Self::UnknownShape { .. } => {
                ErrorKind::Call
            }
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Signing(_)
            | Self::Compile(_)
            | Self::TransactionTooLarge { .. }
            | Self::InvalidTipAmount(..)
            | Self::BundleSize { .. }
            | Self::BlockhashMismatch { .. }
            | Self::SessionActive(_)
            | Self::InvalidConfig(_) => ErrorKind::Caller,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
