/// Tip amounts and tip-account selection.
///
/// A Jito tip is a plain SOL transfer to one of the relay-designated tip
/// accounts.  The set rotates, so it is fetched from the block-engine on
/// every build instead of being hardcoded or cached.
use std::str::FromStr;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use solana_sdk::{instruction::Instruction, pubkey, pubkey::Pubkey, system_instruction};
use tracing::{debug, instrument};

use crate::error::{RelayError, Result};
use crate::relay::RelayConnection;
use crate::status;

/// Minimum sensible tip – below this the transaction is unlikely to receive
/// priority from the leader/block-engine.
pub const MIN_TIP_LAMPORTS: u64 = 1_000; // 0.000001 SOL

/// Wrapped-SOL mint; tips are always paid in native SOL.
pub const NATIVE_SOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

// ─── Tip amounts ────────────────────────────────────────────────────────────

/// Named tip levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Low,
    #[default]
    Standard,
    High,
    Critical,
}

impl PriorityTier {
    pub fn lamports(self) -> u64 {
        match self {
            Self::Low => 1_000,
            Self::Standard => 10_000,
            Self::High => 100_000,
            Self::Critical => 1_000_000,
        }
    }
}

impl FromStr for PriorityTier {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "standard" | "normal" => Ok(Self::Standard),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(RelayError::InvalidConfig(format!("unknown priority tier `{other}`"))),
        }
    }
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Standard => "standard",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// How much to tip: an explicit amount or a tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipAmount {
    Lamports(u64),
    Tier(PriorityTier),
}

impl TipAmount {
    /// Lamports to transfer, rejecting anything below [`MIN_TIP_LAMPORTS`].
    pub fn resolve(self) -> Result<u64> {
        let lamports = match self {
            Self::Lamports(n) => n,
            Self::Tier(tier) => tier.lamports(),
        };
        if lamports < MIN_TIP_LAMPORTS {
            return Err(RelayError::InvalidTipAmount(lamports, MIN_TIP_LAMPORTS));
        }
        Ok(lamports)
    }
}

impl From<u64> for TipAmount {
    fn from(lamports: u64) -> Self {
        Self::Lamports(lamports)
    }
}

impl From<PriorityTier> for TipAmount {
    fn from(tier: PriorityTier) -> Self {
        Self::Tier(tier)
    }
}

// ─── Tip accounts ───────────────────────────────────────────────────────────

/// A relay-designated tip payee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TipAccount {
    pub address: Pubkey,
    pub mint: Pubkey,
}

impl TipAccount {
    pub fn native(address: Pubkey) -> Self {
        Self {
            address,
            mint: NATIVE_SOL_MINT,
        }
    }

    /// SOL transfer from `payer` to this account.
    pub fn transfer_instruction(&self, payer: &Pubkey, lamports: u64) -> Instruction {
        system_instruction::transfer(payer, &self.address, lamports)
    }
}

/// Which of the returned tip accounts to pay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipSelection {
    /// Always the first account the relay lists.
    #[default]
    First,
    /// A random account, spreading write locks across the set.
    Random,
}

impl FromStr for TipSelection {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "random" => Ok(Self::Random),
            other => Err(RelayError::InvalidConfig(format!("unknown tip selection `{other}`"))),
        }
    }
}

impl TipSelection {
    fn pick<'a>(self, accounts: &'a [TipAccount]) -> Option<&'a TipAccount> {
        match self {
            Self::First => accounts.first(),
            Self::Random => accounts.choose(&mut rand::thread_rng()),
        }
    }
}

/// Fetches the tip-account set from the relay and picks one.
#[derive(Clone)]
pub struct TipAccountSelector {
    connection: Arc<RelayConnection>,
    selection: TipSelection,
}

impl TipAccountSelector {
    /// Selector using the connection's configured policy.
    pub fn new(connection: Arc<RelayConnection>) -> Self {
        let selection = connection.config().tip_selection;
        Self {
            connection,
            selection,
        }
    }

    pub fn with_selection(mut self, selection: TipSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn selection(&self) -> TipSelection {
        self.selection
    }

    /// Every tip account the relay currently lists, in relay order.
    pub async fn list_tip_accounts(&self) -> Result<Vec<TipAccount>> {
        let engine = self.connection.acquire().await?;
        let response = match engine.get_tip_accounts().await {
            Ok(response) => response,
            Err(e) => {
                self.connection.record_failure(&e).await;
                return Err(e);
            }
        };
        self.connection.record_success();

        let accounts = status::parse_tip_accounts(&response)?;
        Ok(accounts.into_iter().map(TipAccount::native).collect())
    }

    /// One tip account per the selection policy.
    ///
    /// # Errors
    /// [`RelayError::EmptyTipAccounts`] if the relay lists none.
    #[instrument(skip_all, fields(selection = ?self.selection))]
    pub async fn select_tip_account(&self) -> Result<TipAccount> {
        let accounts = self.list_tip_accounts().await?;
        let picked = self
            .selection
            .pick(&accounts)
            .copied()
            .ok_or(RelayError::EmptyTipAccounts)?;
        debug!(tip_account = %picked.address, available = accounts.len(), "tip account selected");
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::test_utils::{connection, tip_accounts, ScriptedEngine};
    use serde_json::json;

    const ACCOUNTS: [&str; 3] = [
        "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
        "HFqU5x63VTqvQss8hp11i4bVqkfRtQ7NmXwkiY8qHb2G",
        "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
    ];

    fn selector(engine: ScriptedEngine, selection: TipSelection) -> TipAccountSelector {
        TipAccountSelector::new(connection(engine, RelayConfig::default())).with_selection(selection)
    }

    #[test]
    fn tier_lookup_table() {
        assert_eq!(PriorityTier::Low.lamports(), 1_000);
        assert_eq!(PriorityTier::Standard.lamports(), 10_000);
        assert_eq!(PriorityTier::High.lamports(), 100_000);
        assert_eq!(PriorityTier::Critical.lamports(), 1_000_000);
        assert_eq!("HIGH".parse::<PriorityTier>().unwrap(), PriorityTier::High);
        assert!("urgent".parse::<PriorityTier>().is_err());
    }

    #[test]
    fn tip_amount_rejects_below_minimum() {
        assert!(matches!(
            TipAmount::Lamports(0).resolve(),
            Err(RelayError::InvalidTipAmount(0, MIN_TIP_LAMPORTS))
        ));
        assert_eq!(TipAmount::Lamports(MIN_TIP_LAMPORTS).resolve().unwrap(), 1_000);
        assert_eq!(TipAmount::from(PriorityTier::High).resolve().unwrap(), 100_000);
    }

    #[test]
    fn transfer_instruction_has_correct_accounts() {
        let payer = Pubkey::new_unique();
        let account = TipAccount::native(Pubkey::new_unique());
        let ix = account.transfer_instruction(&payer, 10_000);
        assert_eq!(ix.accounts.len(), 2);
        assert!(ix.accounts[0].is_signer);
        assert!(ix.accounts[0].is_writable);
        assert!(!ix.accounts[1].is_signer);
        assert!(ix.accounts[1].is_writable);
        assert_eq!(ix.accounts[1].pubkey, account.address);
        assert_eq!(account.mint, NATIVE_SOL_MINT);
    }

    #[tokio::test]
    async fn first_selection_is_deterministic() {
        let engine = ScriptedEngine::new().always("getTipAccounts", tip_accounts(&ACCOUNTS));
        let selector = selector(engine, TipSelection::First);

        for _ in 0..3 {
            let picked = selector.select_tip_account().await.unwrap();
            assert_eq!(picked.address.to_string(), ACCOUNTS[0]);
        }
    }

    #[tokio::test]
    async fn random_selection_stays_in_set() {
        let engine = ScriptedEngine::new().always("getTipAccounts", tip_accounts(&ACCOUNTS));
        let selector = selector(engine, TipSelection::Random);

        let picked = selector.select_tip_account().await.unwrap();
        assert!(ACCOUNTS.contains(&picked.address.to_string().as_str()));
    }

    #[tokio::test]
    async fn empty_list_is_empty_tip_accounts() {
        let engine = ScriptedEngine::new().respond("getTipAccounts", json!({ "result": [] }));
        let err = selector(engine, TipSelection::First)
            .select_tip_account()
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::EmptyTipAccounts));
        assert_eq!(err.to_string(), "No tip accounts available");
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let engine = ScriptedEngine::new().fail("getTipAccounts", "connection refused");
        let err = selector(engine, TipSelection::First)
            .select_tip_account()
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Transport { method: "getTipAccounts", .. }));
    }

    #[test]
    fn selection_parses() {
        assert_eq!("Random".parse::<TipSelection>().unwrap(), TipSelection::Random);
        assert!("round-robin".parse::<TipSelection>().is_err());
    }
}
