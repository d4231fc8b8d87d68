use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, instrument, warn};

use crate::adapters::traits::LedgerGateway;
use crate::error::AppResult;
use crate::ledger::models::{Operation, PayoutState, PendingTransfer};
use crate::ledger::DepositLedger;

/// Waits for a broadcast payout's block to become irreversible, then checks
/// the payout is really in it.
///
/// The wait has no upper bound. A stalled chain keeps the payout in
/// `WaitingFinality` with its amount debited.
pub struct FinalityWatcher {
    gateway: Arc<dyn LedgerGateway>,
    ledger: Arc<DepositLedger>,
    poll_interval: Duration,
}

impl FinalityWatcher {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        ledger: Arc<DepositLedger>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            ledger,
            poll_interval,
        }
    }

    /// Drive one payout to `Confirmed` or `RolledBack`
    #[instrument(skip(self, pending), fields(payout_id = %pending.payout_id, block = pending.block_num))]
    pub async fn watch(&self, pending: PendingTransfer) -> PayoutState {
        loop {
            match self.check(&pending).await {
                Ok(PayoutState::WaitingFinality) => {
                    debug!("Block {} not yet irreversible", pending.block_num);
                }
                Ok(PayoutState::Confirmed) => {
                    info!(
                        "✅ Transfer of {} to {} is irreversible",
                        pending.operation.amount, pending.operation.to
                    );
                    return PayoutState::Confirmed;
                }
                Ok(PayoutState::RolledBack) => {
                    warn!(
                        "⚠️ {:?} has not been accepted in block {}",
                        pending.operation, pending.block_num
                    );
                    self.ledger.rollback(&pending.deposit_id, pending.amount());
                    return PayoutState::RolledBack;
                }
                Err(e) => {
                    warn!("Finality check for block {} failed: {}", pending.block_num, e);
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Single observation of the payout's state
    async fn check(&self, pending: &PendingTransfer) -> AppResult<PayoutState> {
        let head = self.gateway.chain_head().await?;
        if !head.is_irreversible(pending.block_num) {
            return Ok(PayoutState::WaitingFinality);
        }

        let operations = self
            .gateway
            .operations_in_block(pending.block_num, false)
            .await?;

        let included = operations.iter().any(|op| match op {
            Operation::Transfer(transfer) => *transfer == pending.operation,
            Operation::Other { .. } => false,
        });

        Ok(if included {
            PayoutState::Confirmed
        } else {
            PayoutState::RolledBack
        })
    }
}
