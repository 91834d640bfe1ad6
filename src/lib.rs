//! Tipped Jito bundle submission and confirmation tracking.
//!
//! ```text
//!   TipAccountSelector ──▶ TipTransactionBuilder ──▶ Bundle::assemble
//!                                                          │
//!                                                          ▼
//!                    ConfirmationTracker ◀── bundle id ── BundleSubmitter
//!                              │                           │
//!                              └──────▶ RelayConnection ◀──┘
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod relay;
pub mod status;
pub mod submit;
pub mod tip;
pub mod tracker;
pub mod tx_builder;

#[cfg(test)]
mod test_utils;

pub use bundle::{Bundle, BundleResult, ConfirmationState};
pub use config::{Network, RelayConfig, TrackerConfig, MAX_BUNDLE_SIZE};
pub use error::{ErrorKind, RelayError, Result};
pub use relay::{BlockEngine, JitoBlockEngine, RelayConnection, RelayConnector, RelayHandle};
pub use submit::BundleSubmitter;
pub use tip::{PriorityTier, TipAccount, TipAccountSelector, TipAmount, TipSelection};
pub use tracker::{ConfirmationTracker, TrackingOutcome, TrackingSession};
pub use tx_builder::{TipTransaction, TipTransactionBuilder};
