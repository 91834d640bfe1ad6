/// Bundle submission to the block-engine.
///
/// One `sendBundle` per call, no retries.  The relay call runs on its own
/// task and is raced against the caller's deadline; see
/// [`BundleSubmitter::submit`] for what a timeout does and does not mean.
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, info, instrument, warn};

use crate::bundle::{Bundle, BundleResult};
use crate::error::{RelayError, Result};
use crate::relay::RelayConnection;
use crate::status;

const METHOD: &str = "sendBundle";

/// Serialize each transaction → bincode → base64.
pub fn encode_transactions(transactions: &[VersionedTransaction]) -> Result<Vec<String>> {
    transactions
        .iter()
        .map(|tx| {
            let bytes =
                bincode::serialize(tx).map_err(|e| RelayError::Serialization(e.to_string()))?;
            Ok(general_purpose::STANDARD.encode(bytes))
        })
        .collect()
}

#[derive(Clone)]
pub struct BundleSubmitter {
    connection: Arc<RelayConnection>,
}

impl BundleSubmitter {
    pub fn new(connection: Arc<RelayConnection>) -> Self {
        Self { connection }
    }

    /// Submit `transactions` as one atomic bundle.
    ///
    /// Ordering and content are the caller's business (the tip goes last);
    /// only the bundle size is checked here.
    ///
    /// # Timeout
    /// When `timeout` fires first this returns [`RelayError::Timeout`]
    /// immediately, but the `sendBundle` call is **not** cancelled: it keeps
    /// running in the background and its late outcome is only logged.  A
    /// timed-out bundle may still be accepted and land on-chain.
    ///
    /// # Errors
    /// * [`RelayError::BundleSize`] – empty or above `max_bundle_size`
    /// * [`RelayError::Call`] – the relay rejected the bundle (its message is kept)
    /// * [`RelayError::Transport`] – the relay could not be reached
    #[instrument(skip_all, fields(bundle_size = transactions.len(), timeout_ms = timeout.as_millis() as u64))]
    pub async fn submit(
        &self,
        transactions: Vec<VersionedTransaction>,
        timeout: Duration,
    ) -> Result<BundleResult> {
        let max = self.connection.config().max_bundle_size;
        if transactions.is_empty() || transactions.len() > max {
            return Err(RelayError::BundleSize {
                count: transactions.len(),
                max,
            });
        }

        let encoded = encode_transactions(&transactions)?;
        let signatures: Vec<String> = transactions
            .iter()
            .map(|tx| {
                tx.signatures
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            })
            .collect();

        let engine = self.connection.acquire().await?;

        info!("submitting bundle to Jito block-engine");
        let mut call = tokio::spawn(async move { engine.send_bundle(encoded).await });

        let joined = match tokio::time::timeout(timeout, &mut call).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("sendBundle deadline passed; the call keeps running detached");
                let connection = Arc::clone(&self.connection);
                tokio::spawn(async move {
                    match call.await {
                        Ok(Ok(response)) => match status::parse_send_bundle(&response) {
                            Ok(bundle_id) => {
                                warn!(%bundle_id, "bundle accepted after the caller timed out")
                            }
                            Err(e) => debug!(error = %e, "late sendBundle was rejected"),
                        },
                        Ok(Err(e)) => {
                            connection.record_failure(&e).await;
                            debug!(error = %e, "late sendBundle failed");
                        }
                        Err(e) => warn!(error = %e, "detached sendBundle task did not finish"),
                    }
                });
                return Err(RelayError::Timeout(timeout));
            }
        };

        let response = match joined {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.connection.record_failure(&e).await;
                warn!(error = %e, "sendBundle failed");
                return Err(e);
            }
            Err(e) => {
                return Err(RelayError::Transport {
                    method: METHOD,
                    message: format!("send task failed: {e}"),
                })
            }
        };
        self.connection.record_success();

        let bundle_id = status::parse_send_bundle(&response).inspect_err(|e| {
            warn!(error = %e, "bundle rejected by block-engine");
        })?;

        info!(%bundle_id, "bundle accepted by block-engine");
        Ok(BundleResult {
            bundle_id,
            accepted: true,
            signatures,
            message: None,
        })
    }

    /// [`submit`](Self::submit) for an assembled [`Bundle`].
    pub async fn submit_bundle(&self, bundle: Bundle, timeout: Duration) -> Result<BundleResult> {
        self.submit(bundle.into_transactions(), timeout).await
    }

    /// [`submit`](Self::submit) with the configured `submit_timeout`.
    pub async fn submit_with_default_timeout(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<BundleResult> {
        let timeout = self.connection.config().submit_timeout;
        self.submit(transactions, timeout).await
    }
}
