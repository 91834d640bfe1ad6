/// Jito bundle relay - binary entry-point.
///
/// Runs the whole pipeline once:
///   1. Load `RelayConfig` from the environment
///   2. Get latest blockhash from Solana RPC
///   3. Build an application transfer + a signed Jito tip transaction
///   4. Submit both as one bundle
///   5. Track the bundle until confirmed, failed or undetermined
///
/// # Usage
/// ```bash
/// # With default mainnet endpoints and an ephemeral keypair:
/// cargo run
///
/// # Testnet, a funded wallet and a high-priority tip:
/// JITO_NETWORK=testnet \
/// RPC_URL=https://api.testnet.solana.com \
/// KEYPAIR_PATH=~/.config/solana/id.json \
/// TIP_TIER=high \
/// cargo run
/// ```
use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    message::{v0, VersionedMessage},
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair},
    signer::Signer,
    system_instruction,
    transaction::VersionedTransaction,
};
use tracing::{error, info, warn};

use jito_bundle_relay::{
    Bundle, BundleSubmitter, ConfirmationState, ConfirmationTracker, PriorityTier, RelayConfig,
    RelayConnection, TipAccountSelector, TipAmount, TipTransactionBuilder,
};

// ─── Configuration ──────────────────────────────────────────────────────────

/// SOL amount moved by the demo transfer.
const TRANSFER_AMOUNT: u64 = LAMPORTS_PER_SOL / 1_000; // 0.001 SOL

fn tip_amount() -> Result<TipAmount> {
    if let Ok(raw) = env::var("TIP_LAMPORTS") {
        let lamports = raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("TIP_LAMPORTS={raw}"))?;
        return Ok(TipAmount::Lamports(lamports));
    }
    let tier = match env::var("TIP_TIER") {
        Ok(raw) => raw.parse::<PriorityTier>()?,
        Err(_) => PriorityTier::default(),
    };
    Ok(TipAmount::Tier(tier))
}

fn load_payer() -> Result<Keypair> {
    match env::var("KEYPAIR_PATH") {
        Ok(path) => read_keypair_file(&path).map_err(|e| anyhow!("reading keypair {path}: {e}")),
        Err(_) => Ok(Keypair::new()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Tracing setup ───────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jito_bundle_relay=debug".into()),
        )
        .init();

    info!("=== Jito bundle relay ===");

    // ── 1. Configuration ────────────────────────────────────────────────
    let config = RelayConfig::from_env()?;
    let rpc_url = env::var("RPC_URL")
        .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string());
    let amount = tip_amount()?;
    info!(
        network = %config.network,
        block_engine = %config.endpoint(),
        rpc = %rpc_url,
        tip = ?amount,
        "configuration loaded"
    );

    let connection = Arc::new(RelayConnection::new(config));
    let builder = TipTransactionBuilder::new(TipAccountSelector::new(connection.clone()));
    let submitter = BundleSubmitter::new(connection.clone());
    let tracker = ConfirmationTracker::new(connection.clone());

    // ── 2. Wallet + blockhash ───────────────────────────────────────────
    let payer = load_payer()?;
    info!(pubkey = %payer.pubkey(), "wallet loaded");

    let rpc = RpcClient::new(rpc_url);
    let blockhash = rpc
        .get_latest_blockhash()
        .await
        .context("fetching latest blockhash")?;
    info!(%blockhash, "latest blockhash");

    // ── 3. Application transaction + tip ────────────────────────────────
    let target = Pubkey::new_unique();
    let transfer = system_instruction::transfer(&payer.pubkey(), &target, TRANSFER_AMOUNT);
    let message = v0::Message::try_compile(&payer.pubkey(), &[transfer], &[], blockhash)?;
    let app_tx = VersionedTransaction::try_new(VersionedMessage::V0(message), &[&payer])?;
    info!(amount = TRANSFER_AMOUNT, target = %target, "built application transaction");

    let tip = builder.build_tip_transaction(&payer, blockhash, amount).await?;
    info!(
        tip_account = %tip.tip_account,
        lamports = tip.lamports,
        signature = %tip.signature(),
        "built tip transaction"
    );

    let bundle = Bundle::assemble(
        vec![app_tx],
        tip,
        connection.config().max_bundle_size,
    )?;

    // ── 4. Submit ───────────────────────────────────────────────────────
    let timeout = connection.config().submit_timeout;
    let result = match submitter.submit_bundle(bundle, timeout).await {
        Ok(result) => result,
        Err(e) if e.is_timeout() => {
            warn!(error = %e, "submission deadline passed; the bundle may still land");
            return Ok(());
        }
        Err(e) => {
            // Expected when running offline / without a funded wallet
            error!(error = %e, kind = ?e.kind(), "bundle submission failed");
            return Ok(());
        }
    };
    info!(%result, "bundle submitted");

    // ── 5. Track ────────────────────────────────────────────────────────
    let outcome = tracker.track(&result.bundle_id).await?;
    match &outcome.state {
        ConfirmationState::Confirmed { slot } => {
            info!(?slot, polls = outcome.polls, "bundle landed on-chain");
            for sig in &result.signatures {
                info!("https://solscan.io/tx/{sig}");
            }
        }
        ConfirmationState::Failed { reason, .. } => {
            error!(%reason, "bundle failed");
        }
        other => {
            warn!(
                state = %other,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "gave up waiting for a verdict"
            );
        }
    }

    info!("=== done ===");
    Ok(())
}
