use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::adapters::traits::{LedgerGateway, TransactionSigner};
use crate::error::{AppError, AppResult};
use crate::ledger::models::*;
use crate::ledger::DepositLedger;

/// Transactions stay valid this long after the chain time they were built at
pub const TRANSACTION_EXPIRATION_MINUTES: i64 = 10;

/// Payment account and signing material
#[derive(Debug, Clone)]
pub struct PayoutSettings {
    pub payment_account: String,
    pub signing_keys: Vec<String>,
    pub chain_id: String,
    pub memo: String,
}

/// Lower 16 bits of the block before the last irreversible one
pub fn ref_block_num(last_irreversible_block_num: u32) -> u16 {
    (last_irreversible_block_num.wrapping_sub(1) & 0xffff) as u16
}

/// Bytes 4..8 of the parent block id, little-endian
pub fn ref_block_prefix(previous: &str) -> AppResult<u32> {
    let bytes = hex::decode(previous)?;
    let prefix: [u8; 4] = bytes
        .get(4..8)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| AppError::InvalidInput(format!("Block id too short: {}", previous)))?;

    Ok(u32::from_le_bytes(prefix))
}

/// Unsigned transaction bound to the block `reference` describes
pub fn build_transaction(
    head: &ChainHead,
    reference: &BlockHeader,
    operations: Vec<Operation>,
) -> AppResult<Transaction> {
    Ok(Transaction {
        ref_block_num: ref_block_num(head.last_irreversible_block_num),
        ref_block_prefix: ref_block_prefix(&reference.previous)?,
        expiration: head.time + chrono::Duration::minutes(TRANSACTION_EXPIRATION_MINUTES),
        operations,
        extensions: Vec::new(),
    })
}

/// Sends one already-debited payout to the ledger
///
/// Owns the rollback half of the optimistic debit: any failure before the
/// node reports inclusion returns the amount to the deposit.
pub struct PaymentExecutor {
    gateway: Arc<dyn LedgerGateway>,
    signer: Arc<dyn TransactionSigner>,
    ledger: Arc<DepositLedger>,
    settings: PayoutSettings,
}

impl PaymentExecutor {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        signer: Arc<dyn TransactionSigner>,
        ledger: Arc<DepositLedger>,
        settings: PayoutSettings,
    ) -> Self {
        Self {
            gateway,
            signer,
            ledger,
            settings,
        }
    }

    /// Broadcast the payout. `None` means it failed and was rolled back.
    #[instrument(skip(self, payout), fields(payout_id = %payout.id, deposit = %payout.deposit_id))]
    pub async fn execute(&self, payout: &Payout) -> Option<PendingTransfer> {
        match self.broadcast(payout).await {
            Ok(pending) => {
                info!(
                    "📤 Sent {} to {}, included in block {}",
                    payout.amount, payout.account, pending.block_num
                );
                Some(pending)
            }
            Err(e) => {
                error!(
                    "❌ Failed to transfer {} to {}: {}",
                    payout.amount, payout.account, e
                );
                self.ledger.rollback(&payout.deposit_id, payout.amount.amount);
                None
            }
        }
    }

    async fn broadcast(&self, payout: &Payout) -> AppResult<PendingTransfer> {
        let head = self.gateway.chain_head().await?;
        let reference = self.gateway.block(head.last_irreversible_block_num).await?;

        let operation = TransferOperation {
            from: self.settings.payment_account.clone(),
            to: payout.account.clone(),
            amount: payout.amount.clone(),
            memo: self.settings.memo.clone(),
        };

        let tx = build_transaction(
            &head,
            &reference,
            vec![Operation::Transfer(operation.clone())],
        )?;

        let signed = self
            .signer
            .sign(&tx, &self.settings.signing_keys, &self.settings.chain_id)
            .await?;

        let receipt = self.gateway.broadcast_synchronous(&signed).await?;
        if receipt.expired {
            return Err(AppError::Internal(format!(
                "Transaction {} expired before inclusion",
                receipt.id
            )));
        }

        Ok(PendingTransfer {
            payout_id: payout.id,
            deposit_id: payout.deposit_id.clone(),
            block_num: receipt.block_num,
            operation,
        })
    }
}
