/// Relay access: the block-engine contract and the lazily-built connection.
///
/// ```text
///   BundleSubmitter ─┐
///   TipAccountSelector ─┼──▶ RelayConnection::acquire() ──▶ Arc<dyn BlockEngine>
///   ConfirmationTracker ┘         (single-flight init)          │
///                                                               ▼
///                                                   JitoBlockEngine (jito-sdk-rust)
/// ```
///
/// [`RelayConnection`] is an explicitly owned resource: callers share it
/// through an `Arc` and it builds the underlying handle on first use.
/// Construction is serialized by an async mutex, so a cold start with many
/// concurrent callers builds exactly one handle.  A failed construction
/// leaves the cache empty and the next `acquire()` tries again.
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jito_sdk_rust::JitoJsonRpcSDK;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::RelayConfig;
use crate::error::{ErrorKind, RelayError, Result};
use crate::status::{self, BundleStatusEntry, ConfirmationTag, InflightStatus};

/// Delay between in-flight checks inside `confirm_inflight_bundle`.
pub const INFLIGHT_RECHECK_INTERVAL: Duration = Duration::from_millis(250);

// ─── Block-engine contract ──────────────────────────────────────────────────

/// The JSON-RPC surface of a Jito block-engine.
///
/// Raw responses are returned as `serde_json::Value`; [`crate::status`]
/// turns them into typed values.  Implementations only report transport
/// failures as errors, application-level errors stay in the JSON.
#[async_trait]
pub trait BlockEngine: Send + Sync {
    /// `sendBundle` with base64-encoded signed transactions.
    async fn send_bundle(&self, encoded_txs: Vec<String>) -> Result<Value>;

    /// `getBundleStatuses` for the given ids.
    async fn get_bundle_statuses(&self, bundle_ids: Vec<String>) -> Result<Value>;

    /// `getInflightBundleStatuses` for the given ids.
    async fn get_in_flight_bundle_statuses(&self, bundle_ids: Vec<String>) -> Result<Value>;

    /// `getTipAccounts`.
    async fn get_tip_accounts(&self) -> Result<Value>;

    /// Wait (at most `timeout`) for an in-flight bundle to settle.
    ///
    /// Polls `getInflightBundleStatuses`; once the bundle has landed the
    /// detailed `getBundleStatuses` entry is returned.  `Failed` and
    /// `Invalid` come back as a `processed` entry carrying the in-flight
    /// status as its rejection reason.  Returns [`RelayError::Timeout`] if
    /// the bundle is still pending when the budget runs out.
    async fn confirm_inflight_bundle(
        &self,
        bundle_id: &str,
        timeout: Duration,
    ) -> Result<BundleStatusEntry> {
        tokio::time::timeout(timeout, watch_inflight(self, bundle_id))
            .await
            .map_err(|_| RelayError::Timeout(timeout))?
    }
}

async fn watch_inflight<E>(engine: &E, bundle_id: &str) -> Result<BundleStatusEntry>
where
    E: BlockEngine + ?Sized,
{
    loop {
        let response = engine
            .get_in_flight_bundle_statuses(vec![bundle_id.to_string()])
            .await?;

        match status::parse_inflight_status(&response, bundle_id)? {
            Some(InflightStatus::Landed { slot }) => {
                debug!(bundle_id, ?slot, "in-flight bundle landed, reading final status");
                let response = engine
                    .get_bundle_statuses(vec![bundle_id.to_string()])
                    .await?;
                let entry = status::parse_bundle_statuses(&response, bundle_id)?;
                return Ok(entry.unwrap_or_else(|| BundleStatusEntry {
                    bundle_id: bundle_id.to_string(),
                    tag: ConfirmationTag::Processed,
                    slot,
                    err: None,
                    transactions: Vec::new(),
                }));
            }
            Some(settled @ (InflightStatus::Failed | InflightStatus::Invalid)) => {
                return Ok(BundleStatusEntry {
                    bundle_id: bundle_id.to_string(),
                    tag: ConfirmationTag::Processed,
                    slot: None,
                    err: Some(format!("in-flight status {settled}")),
                    transactions: Vec::new(),
                });
            }
            Some(InflightStatus::Pending) | None => {
                tokio::time::sleep(INFLIGHT_RECHECK_INTERVAL).await;
            }
        }
    }
}

// ─── Jito JSON-RPC implementation ───────────────────────────────────────────

/// [`BlockEngine`] backed by [`JitoJsonRpcSDK`].
pub struct JitoBlockEngine {
    jito: JitoJsonRpcSDK,
    uuid: Option<String>,
}

impl JitoBlockEngine {
    pub fn new(endpoint: &str, uuid: Option<String>) -> Self {
        Self {
            jito: JitoJsonRpcSDK::new(endpoint, uuid.clone()),
            uuid,
        }
    }

    /// Reference to the underlying Jito JSON-RPC SDK.
    pub fn jito_sdk(&self) -> &JitoJsonRpcSDK {
        &self.jito
    }
}

fn transport(method: &'static str, err: impl std::fmt::Display) -> RelayError {
    RelayError::Transport {
        method,
        message: err.to_string(),
    }
}

#[async_trait]
impl BlockEngine for JitoBlockEngine {
    async fn send_bundle(&self, encoded_txs: Vec<String>) -> Result<Value> {
        let params = json!([encoded_txs, { "encoding": "base64" }]);
        self.jito
            .send_bundle(Some(params), self.uuid.as_deref())
            .await
            .map_err(|e| transport("sendBundle", e))
    }

    async fn get_bundle_statuses(&self, bundle_ids: Vec<String>) -> Result<Value> {
        self.jito
            .get_bundle_statuses(bundle_ids)
            .await
            .map_err(|e| transport("getBundleStatuses", e))
    }

    async fn get_in_flight_bundle_statuses(&self, bundle_ids: Vec<String>) -> Result<Value> {
        self.jito
            .get_in_flight_bundle_statuses(bundle_ids)
            .await
            .map_err(|e| transport("getInflightBundleStatuses", e))
    }

    async fn get_tip_accounts(&self) -> Result<Value> {
        self.jito
            .get_tip_accounts()
            .await
            .map_err(|e| transport("getTipAccounts", e))
    }
}

// ─── Connectors ─────────────────────────────────────────────────────────────

/// Shared, type-erased block-engine handle.
pub type RelayHandle = Arc<dyn BlockEngine>;

/// Builds a [`RelayHandle`] from configuration.
///
/// Any `Fn(&RelayConfig) -> Result<RelayHandle>` closure is a connector.
pub trait RelayConnector: Send + Sync {
    fn connect(&self, config: &RelayConfig) -> Result<RelayHandle>;
}

impl<F> RelayConnector for F
where
    F: Fn(&RelayConfig) -> Result<RelayHandle> + Send + Sync,
{
    fn connect(&self, config: &RelayConfig) -> Result<RelayHandle> {
        self(config)
    }
}

/// Connector producing a [`JitoBlockEngine`] for the configured endpoint.
#[derive(Clone, Copy, Debug, Default)]
pub struct JitoConnector;

impl RelayConnector for JitoConnector {
    fn connect(&self, config: &RelayConfig) -> Result<RelayHandle> {
        let endpoint = config.endpoint();
        validate_endpoint(endpoint)?;
        Ok(Arc::new(JitoBlockEngine::new(endpoint, config.uuid.clone())))
    }
}

fn validate_endpoint(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| RelayError::Init(format!("endpoint `{url}` is not an http(s) URL")))?;

    let host = rest.split(['/', ':', '?']).next().unwrap_or_default();
    if host.is_empty() || url.chars().any(char::is_whitespace) {
        return Err(RelayError::Init(format!("endpoint `{url}` has no valid host")));
    }
    Ok(())
}

// ─── Relay connection ───────────────────────────────────────────────────────

/// Lazily-initialized, explicitly owned relay handle.
pub struct RelayConnection {
    config: RelayConfig,
    connector: Box<dyn RelayConnector>,
    handle: Mutex<Option<RelayHandle>>,
    consecutive_failures: AtomicU32,
    connects: AtomicU64,
}

impl RelayConnection {
    /// Connection to the configured Jito block-engine.
    pub fn new(config: RelayConfig) -> Self {
        Self::with_connector(config, JitoConnector)
    }

    pub fn with_connector(config: RelayConfig, connector: impl RelayConnector + 'static) -> Self {
        Self {
            config,
            connector: Box::new(connector),
            handle: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
            connects: AtomicU64::new(0),
        }
    }

    /// Return the cached handle, building it first if needed.
    #[instrument(skip_all, fields(endpoint = %self.config.endpoint()))]
    pub async fn acquire(&self) -> Result<RelayHandle> {
        let mut slot = self.handle.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        match self.connector.connect(&self.config) {
            Ok(handle) => {
                self.connects.fetch_add(1, Ordering::Relaxed);
                info!(network = %self.config.network, "relay connection initialized");
                *slot = Some(Arc::clone(&handle));
                Ok(handle)
            }
            Err(e) => {
                warn!(error = %e, "relay connection init failed");
                Err(match e {
                    RelayError::Init(_) => e,
                    other => RelayError::Init(other.to_string()),
                })
            }
        }
    }

    /// Drop the cached handle; the next `acquire()` rebuilds it.
    pub async fn reset(&self) {
        let mut slot = self.handle.lock().await;
        if slot.take().is_some() {
            info!("relay connection reset");
        }
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub async fn is_initialized(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Note a successful relay round-trip.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Note a failed relay call. Transport failures count towards
    /// `reset_after_failures`; reaching it drops the cached handle.
    pub async fn record_failure(&self, err: &RelayError) {
        if err.kind() != ErrorKind::Transport {
            return;
        }
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.reset_after_failures {
            warn!(failures, error = %err, "repeated transport failures, resetting relay connection");
            self.reset().await;
        }
    }

    /// How many times a handle has been constructed.
    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
