/// Bundle types: the submission payload, the submission result, and the
/// confirmation state machine's states.
///
/// A bundle is an ordered list of 1–5 signed transactions that execute
/// atomically in a single slot.  Every transaction must reference the same
/// blockhash, and the tip transaction goes **last**.
use serde::{Deserialize, Serialize};
use solana_sdk::{hash::Hash, transaction::VersionedTransaction};

use crate::error::{RelayError, Result};
use crate::tx_builder::TipTransaction;

// ─── Bundle payload ─────────────────────────────────────────────────────────

/// A validated, ready-to-submit bundle.
#[derive(Clone, Debug)]
pub struct Bundle {
    transactions: Vec<VersionedTransaction>,
    blockhash: Hash,
    tip_lamports: u64,
}

impl Bundle {
    /// Append `tip` to the application transactions and check the bundle
    /// invariants: size within `1..=max_size` and one shared blockhash.
    ///
    /// The relay would reject a mixed-blockhash bundle anyway; catching it
    /// here reports it as the caller error it is.
    pub fn assemble(
        transactions: Vec<VersionedTransaction>,
        tip: TipTransaction,
        max_size: usize,
    ) -> Result<Self> {
        let count = transactions.len() + 1;
        if count > max_size {
            return Err(RelayError::BundleSize { count, max: max_size });
        }

        let blockhash = tip.blockhash;
        for (index, tx) in transactions.iter().enumerate() {
            let found = *tx.message.recent_blockhash();
            if found != blockhash {
                return Err(RelayError::BlockhashMismatch {
                    index,
                    expected: blockhash,
                    found,
                });
            }
        }

        let tip_lamports = tip.lamports;
        let mut transactions = transactions;
        transactions.push(tip.transaction);

        Ok(Self {
            transactions,
            blockhash,
            tip_lamports,
        })
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn tip_lamports(&self) -> u64 {
        self.tip_lamports
    }

    pub fn transactions(&self) -> &[VersionedTransaction] {
        &self.transactions
    }

    pub fn into_transactions(self) -> Vec<VersionedTransaction> {
        self.transactions
    }
}

// ─── Bundle result ──────────────────────────────────────────────────────────

/// Result returned after the block-engine accepted a bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleResult {
    /// Relay-issued bundle identifier (used for status polling).
    pub bundle_id: String,
    /// Whether the block-engine accepted the bundle into its auction.
    pub accepted: bool,
    /// Base-58 signatures of each transaction in the bundle.
    pub signatures: Vec<String>,
    /// Optional message from the block-engine.
    pub message: Option<String>,
}

impl std::fmt::Display for BundleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bundle {} ({} txs) {}",
            self.bundle_id,
            self.signatures.len(),
            if self.accepted { "accepted" } else { "not accepted" }
        )
    }
}

// ─── Confirmation state ─────────────────────────────────────────────────────

/// Where a submitted bundle stands, as far as this client knows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationState {
    /// Accepted by the block-engine, not polled yet.
    Submitted,
    /// The block-engine knows the bundle but has no verdict.
    Pending,
    /// Bundle landed; `slot` when the relay reported it.
    Confirmed { slot: Option<u64> },
    /// Bundle was processed with an error, or dropped.
    Failed { slot: Option<u64>, reason: String },
    /// The wait budget ran out before a verdict. Not a failure.
    Unknown,
}

impl ConfirmationState {
    /// `Confirmed`, `Failed` and `Unknown` end a tracking session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed { .. } | Self::Failed { .. } | Self::Unknown)
    }

    /// `Confirmed` and `Failed` are verdicts from the relay; `Unknown` is not.
    pub fn is_verdict(&self) -> bool {
        matches!(self, Self::Confirmed { .. } | Self::Failed { .. })
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub fn slot(&self) -> Option<u64> {
        match self {
            Self::Confirmed { slot } | Self::Failed { slot, .. } => *slot,
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "Submitted"),
            Self::Pending => write!(f, "Pending"),
            Self::Confirmed { slot: Some(slot) } => write!(f, "Confirmed (slot {slot})"),
            Self::Confirmed { slot: None } => write!(f, "Confirmed"),
            Self::Failed { slot: Some(slot), reason } => {
                write!(f, "Failed (slot {slot}): {reason}")
            }
            Self::Failed { slot: None, reason } => write!(f, "Failed: {reason}"),
            Self::Unknown => write!(f, "Unknown (accepted, outcome undetermined)"),
        }
    }
}
