/// Builds the signed tip transaction that closes every bundle.
///
/// The tip is its own V0 transaction (a single SOL transfer) so it can be
/// appended **last** to any bundle without touching the application
/// transactions.  It must reference the same blockhash as the rest of the
/// bundle, so the blockhash is always supplied by the caller.
use solana_sdk::{
    hash::Hash,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signer::Signer,
    transaction::VersionedTransaction,
};
use tracing::{debug, instrument};

use crate::error::{RelayError, Result};
use crate::tip::{TipAccountSelector, TipAmount};

/// Maximum serialised transaction size on Solana (1232 bytes as of v1.18+).
pub const MAX_TX_SIZE: usize = 1_232;

/// A signed tip transfer ready to be appended to a bundle.
#[derive(Clone, Debug)]
pub struct TipTransaction {
    pub transaction: VersionedTransaction,
    pub payer: Pubkey,
    pub tip_account: Pubkey,
    pub lamports: u64,
    pub blockhash: Hash,
}

impl TipTransaction {
    /// Base-58 signature of the tip transfer.
    pub fn signature(&self) -> String {
        self.transaction
            .signatures
            .first()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

/// Resolves the amount, picks a tip account and signs the transfer.
#[derive(Clone)]
pub struct TipTransactionBuilder {
    selector: TipAccountSelector,
}

impl TipTransactionBuilder {
    pub fn new(selector: TipAccountSelector) -> Self {
        Self { selector }
    }

    pub fn selector(&self) -> &TipAccountSelector {
        &self.selector
    }

    /// Build and sign the tip transaction.
    ///
    /// # Arguments
    /// * `payer`     – signs the transfer and pays the fee
    /// * `blockhash` – the blockhash shared by the whole bundle
    /// * `amount`    – explicit lamports or a [`PriorityTier`](crate::tip::PriorityTier)
    ///
    /// # Errors
    /// Tip-account errors are returned unchanged and nothing is signed.
    /// An amount below the minimum fails before the relay is contacted.
    #[instrument(skip_all, fields(payer = %payer.pubkey(), %blockhash))]
    pub async fn build_tip_transaction<S: Signer>(
        &self,
        payer: &S,
        blockhash: Hash,
        amount: impl Into<TipAmount>,
    ) -> Result<TipTransaction> {
        let lamports = amount.into().resolve()?;
        let tip_account = self.selector.select_tip_account().await?;
        let payer_key = payer.pubkey();

        let ix = tip_account.transfer_instruction(&payer_key, lamports);
        let message = v0::Message::try_compile(&payer_key, &[ix], &[], blockhash)
            .map_err(|e| RelayError::Compile(e.to_string()))?;

        let transaction = VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])?;

        let size = bincode::serialize(&transaction)
            .map_err(|e| RelayError::Serialization(e.to_string()))?
            .len();
        if size > MAX_TX_SIZE {
            return Err(RelayError::TransactionTooLarge {
                size,
                max: MAX_TX_SIZE,
            });
        }

        debug!(tip_account = %tip_account.address, lamports, tx_size = size, "tip transaction signed");
        Ok(TipTransaction {
            transaction,
            payer: payer_key,
            tip_account: tip_account.address,
            lamports,
            blockhash,
        })
    }
}
