// Payout Scheduler - sends small payouts from deposits on a fixed cadence
//
// Each tick:
// - Picks one deposit uniformly at random
// - Debits the payout amount under the ledger lock (skips on insufficient funds)
// - Hands the debited payout to a detached task: executor, then finality watcher
//
// Nothing stops a later tick from picking the same deposit while an earlier
// payout is still waiting for finality; every debit is individually checked.

use rand::seq::IndexedRandom;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::execution::{FinalityWatcher, PaymentExecutor};
use crate::ledger::models::{Asset, Payout, PayoutState};
use crate::ledger::DepositLedger;

/// Result of a single scheduling tick
#[derive(Debug)]
pub enum TickOutcome {
    /// Debit succeeded; the payout runs in the returned task
    Dispatched {
        payout: Payout,
        task: JoinHandle<PayoutState>,
    },
    InsufficientFunds { deposit_id: String },
    NoDeposits,
}

pub struct PayoutScheduler {
    ledger: Arc<DepositLedger>,
    executor: Arc<PaymentExecutor>,
    watcher: Arc<FinalityWatcher>,
    amount: Asset,
}

impl PayoutScheduler {
    pub fn new(
        ledger: Arc<DepositLedger>,
        executor: Arc<PaymentExecutor>,
        watcher: Arc<FinalityWatcher>,
        amount: Asset,
    ) -> Self {
        Self {
            ledger,
            executor,
            watcher,
            amount,
        }
    }

    /// Start the payout loop (runs in background)
    pub fn start(self: Arc<Self>, tick_interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("⏰ Paying out {} every {:?}", self.amount, tick_interval);

            loop {
                ticker.tick().await;
                // Dispatched payouts finish on their own
                let _ = self.tick();
            }
        })
    }

    /// Pick a deposit and, if it can cover the amount, dispatch a payout
    pub fn tick(&self) -> TickOutcome {
        let Some(deposit_id) = self.pick_deposit() else {
            debug!("No deposits to pay out from");
            return TickOutcome::NoDeposits;
        };

        let Some(deposit) = self.ledger.deposit(&deposit_id) else {
            return TickOutcome::NoDeposits;
        };

        if !self.ledger.try_debit(&deposit.id, self.amount.amount) {
            info!("⏭️ Not enough {} to transfer to {}", self.amount.symbol, deposit.account);
            return TickOutcome::InsufficientFunds { deposit_id };
        }

        let payout = Payout {
            id: Uuid::new_v4(),
            deposit_id: deposit.id,
            account: deposit.account,
            amount: self.amount.clone(),
        };

        info!(
            "🔄 Debited {} from deposit {} for payout {}",
            payout.amount, payout.deposit_id, payout.id
        );

        let task = self.dispatch(payout.clone());
        TickOutcome::Dispatched { payout, task }
    }

    fn pick_deposit(&self) -> Option<String> {
        let ids = self.ledger.deposit_ids();
        ids.choose(&mut rand::rng()).cloned()
    }

    fn dispatch(&self, payout: Payout) -> JoinHandle<PayoutState> {
        let executor = self.executor.clone();
        let watcher = self.watcher.clone();
        let span = tracing::info_span!("payout", payout_id = %payout.id);

        tokio::spawn(
            async move {
                match executor.execute(&payout).await {
                    Some(pending) => watcher.watch(pending).await,
                    None => PayoutState::RolledBack,
                }
            }
            .instrument(span),
        )
    }
}
