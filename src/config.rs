/// Runtime configuration for relay access, submission and tracking.
///
/// Everything has a sensible default; [`RelayConfig::from_env`] layers
/// environment overrides on top so the binary (and any embedding
/// service) can be tuned without a rebuild.
use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::tip::TipSelection;

// ─── Well-known endpoints ───────────────────────────────────────────────────

/// Jito block-engine JSON-RPC endpoints.
pub mod endpoints {
    /// Mainnet block-engine (primary).
    pub const MAINNET: &str = "https://mainnet.block-engine.jito.wtf/api/v1";
    /// Amsterdam region.
    pub const AMSTERDAM: &str = "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1";
    /// Frankfurt region.
    pub const FRANKFURT: &str = "https://frankfurt.mainnet.block-engine.jito.wtf/api/v1";
    /// New York region.
    pub const NY: &str = "https://ny.mainnet.block-engine.jito.wtf/api/v1";
    /// Tokyo region.
    pub const TOKYO: &str = "https://tokyo.mainnet.block-engine.jito.wtf/api/v1";
    /// Testnet block-engine (Dallas).
    pub const TESTNET: &str = "https://dallas.testnet.block-engine.jito.wtf/api/v1";
}

/// Maximum number of transactions the block-engine accepts in one bundle.
pub const MAX_BUNDLE_SIZE: usize = 5;

// ─── Network mode ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Mainnet => endpoints::MAINNET,
            Self::Testnet => endpoints::TESTNET,
        }
    }
}

impl FromStr for Network {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(RelayError::InvalidConfig(format!("unknown network `{other}`"))),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

// ─── Tracker configuration ──────────────────────────────────────────────────

/// Timing knobs for [`ConfirmationTracker`](crate::tracker::ConfirmationTracker).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Delay before each status poll.
    pub poll_interval: Duration,
    /// Total budget before a session gives up with `Unknown`.
    pub max_wait: Duration,
    /// Budget for a single `confirm_inflight_bundle` fallback call.
    pub inflight_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
            inflight_timeout: Duration::from_secs(1),
        }
    }
}

// ─── Relay configuration ────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Network mode; picks the default block-engine endpoint.
    pub network: Network,
    /// Explicit block-engine URL, overriding the network default.
    pub block_engine_url: Option<String>,
    /// Optional UUID for authenticated Jito access.
    pub uuid: Option<String>,
    /// Default deadline for `sendBundle`.
    pub submit_timeout: Duration,
    /// Hard cap on transactions per bundle.
    pub max_bundle_size: usize,
    /// Consecutive transport failures before the cached connection is dropped.
    pub reset_after_failures: u32,
    /// Tip-account selection policy.
    pub tip_selection: TipSelection,
    pub tracker: TrackerConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            block_engine_url: None,
            uuid: None,
            submit_timeout: Duration::from_secs(5),
            max_bundle_size: MAX_BUNDLE_SIZE,
            reset_after_failures: 3,
            tip_selection: TipSelection::First,
            tracker: TrackerConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Config for the given network with every other knob at its default.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Default::default()
        }
    }

    /// The block-engine URL this config resolves to.
    pub fn endpoint(&self) -> &str {
        self.block_engine_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_endpoint())
    }

    /// Build a config from defaults plus environment overrides.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `JITO_NETWORK` | `mainnet` or `testnet` |
    /// | `JITO_URL` | explicit block-engine URL |
    /// | `JITO_UUID` | auth UUID |
    /// | `JITO_TIP_SELECTION` | `first` or `random` |
    /// | `BUNDLE_SUBMIT_TIMEOUT_MS` | `sendBundle` deadline |
    /// | `BUNDLE_POLL_INTERVAL_MS` | tracker poll interval |
    /// | `BUNDLE_MAX_WAIT_MS` | tracker wait budget |
    /// | `BUNDLE_INFLIGHT_TIMEOUT_MS` | in-flight fallback budget |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(network) = get("JITO_NETWORK") {
            config.network = network.parse()?;
        }
        config.block_engine_url = get("JITO_URL");
        config.uuid = get("JITO_UUID");
        if let Some(selection) = get("JITO_TIP_SELECTION") {
            config.tip_selection = selection.parse()?;
        }
        if let Some(ms) = get("BUNDLE_SUBMIT_TIMEOUT_MS") {
            config.submit_timeout = parse_millis("BUNDLE_SUBMIT_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = get("BUNDLE_POLL_INTERVAL_MS") {
            config.tracker.poll_interval = parse_millis("BUNDLE_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = get("BUNDLE_MAX_WAIT_MS") {
            config.tracker.max_wait = parse_millis("BUNDLE_MAX_WAIT_MS", &ms)?;
        }
        if let Some(ms) = get("BUNDLE_INFLIGHT_TIMEOUT_MS") {
            config.tracker.inflight_timeout = parse_millis("BUNDLE_INFLIGHT_TIMEOUT_MS", &ms)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_bundle_size == 0 || self.max_bundle_size > MAX_BUNDLE_SIZE {
            return Err(RelayError::InvalidConfig(format!(
                "max_bundle_size must be within 1..={MAX_BUNDLE_SIZE}, got {}",
                self.max_bundle_size
            )));
        }
        if self.tracker.poll_interval.is_zero() {
            return Err(RelayError::InvalidConfig("poll interval must be non-zero".into()));
        }
        if self.tracker.max_wait < self.tracker.poll_interval {
            return Err(RelayError::InvalidConfig(
                "max wait must be at least one poll interval".into(),
            ));
        }
        Ok(())
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| RelayError::InvalidConfig(format!("{key}={raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.endpoint(), endpoints::MAINNET);
        assert_eq!(cfg.max_bundle_size, 5);
        assert_eq!(cfg.tip_selection, TipSelection::First);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn network_picks_endpoint() {
        let cfg = RelayConfig::for_network(Network::Testnet);
        assert_eq!(cfg.endpoint(), endpoints::TESTNET);
    }

    #[test]
    fn explicit_url_overrides_network() {
        let cfg = RelayConfig {
            block_engine_url: Some(endpoints::TOKYO.to_string()),
            ..RelayConfig::for_network(Network::Testnet)
        };
        assert_eq!(cfg.endpoint(), endpoints::TOKYO);
    }

    #[test]
    fn env_overrides_are_applied() {
        let cfg = RelayConfig::from_lookup(lookup(&[
            ("JITO_NETWORK", "testnet"),
            ("JITO_UUID", "my-uuid"),
            ("JITO_TIP_SELECTION", "random"),
            ("BUNDLE_SUBMIT_TIMEOUT_MS", "1500"),
            ("BUNDLE_POLL_INTERVAL_MS", "250"),
            ("BUNDLE_MAX_WAIT_MS", "30000"),
        ]))
        .unwrap();

        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.uuid.as_deref(), Some("my-uuid"));
        assert_eq!(cfg.tip_selection, TipSelection::Random);
        assert_eq!(cfg.submit_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.tracker.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.tracker.max_wait, Duration::from_secs(30));
        assert_eq!(cfg.tracker.inflight_timeout, TrackerConfig::default().inflight_timeout);
    }

    #[test]
    fn blank_values_are_ignored() {
        let cfg = RelayConfig::from_lookup(lookup(&[("JITO_URL", "  ")])).unwrap();
        assert!(cfg.block_engine_url.is_none());
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(RelayConfig::from_lookup(lookup(&[("JITO_NETWORK", "devnet")])).is_err());
        assert!(RelayConfig::from_lookup(lookup(&[("BUNDLE_MAX_WAIT_MS", "soon")])).is_err());
        assert!(RelayConfig::from_lookup(lookup(&[
            ("BUNDLE_POLL_INTERVAL_MS", "5000"),
            ("BUNDLE_MAX_WAIT_MS", "1000"),
        ]))
        .is_err());
    }

    #[test]
    fn bundle_size_must_respect_relay_limit() {
        let cfg = RelayConfig {
            max_bundle_size: 6,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn network_parses_aliases() {
        assert_eq!("mainnet-beta".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("TESTNET".parse::<Network>().unwrap(), Network::Testnet);
    }
}
