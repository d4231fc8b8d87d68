// History monitor - folds inbound transfers of the payment account into deposits
//
// Every tick:
// 1. Ask the node for the most recent history sequence
// 2. Fetch the unseen range (cursor, recent] page by page
// 3. Sort by sequence, classify, and fold under the ledger lock
// 4. Move the cursor to `recent` in that same critical section

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::adapters::traits::{LedgerGateway, MOST_RECENT};
use crate::error::AppResult;
use crate::funding::classifier::classify;
use crate::ledger::models::{HistoricalTransaction, InboundTransfer};
use crate::ledger::{DepositLedger, FoldSummary};

/// The node refuses history requests spanning more entries than this
pub const HISTORY_PAGE_SIZE: u32 = 100;

/// Unseen history entries, ascending by sequence
#[derive(Debug, Clone)]
pub struct HistoryBatch {
    /// Sequence the cursor moves to once the batch is folded
    pub upper: u32,
    pub entries: Vec<(u32, HistoricalTransaction)>,
}

/// Tracks the highest folded history sequence of one account
pub struct HistoryCursor {
    account: String,
    gateway: Arc<dyn LedgerGateway>,
    ledger: Arc<DepositLedger>,
}

impl HistoryCursor {
    pub fn new(
        account: impl Into<String>,
        gateway: Arc<dyn LedgerGateway>,
        ledger: Arc<DepositLedger>,
    ) -> Self {
        Self {
            account: account.into(),
            gateway,
            ledger,
        }
    }

    /// Fetch history newer than the cursor. `None` when nothing is new.
    ///
    /// The cursor itself is not moved here; see [`HistoryCursor::fold`].
    pub async fn advance(&self) -> AppResult<Option<HistoryBatch>> {
        let cursor = self.ledger.sequence();

        let recent = self
            .gateway
            .account_history(&self.account, MOST_RECENT, 0)
            .await?;

        let Some(recent_seq) = recent.iter().map(|(seq, _)| *seq).max() else {
            return Ok(None);
        };

        if recent_seq <= cursor {
            return Ok(None);
        }

        let mut entries = Vec::new();
        let mut page_top = recent_seq;

        loop {
            let limit = (page_top - cursor - 1).min(HISTORY_PAGE_SIZE - 1);
            let page = self
                .gateway
                .account_history(&self.account, i64::from(page_top), limit)
                .await?;
            entries.extend(page);

            let page_bottom = page_top - limit;
            if page_bottom <= cursor + 1 {
                break;
            }
            page_top = page_bottom - 1;
        }

        // Node ordering is unspecified and pages may overlap
        entries.retain(|(seq, _)| *seq > cursor && *seq <= recent_seq);
        entries.sort_by_key(|(seq, _)| *seq);
        entries.dedup_by_key(|(seq, _)| *seq);

        debug!(
            "Fetched {} history entries in ({}, {}]",
            entries.len(),
            cursor,
            recent_seq
        );

        Ok(Some(HistoryBatch {
            upper: recent_seq,
            entries,
        }))
    }

    /// Classify and fold a batch, moving the cursor to `batch.upper`
    pub fn fold(&self, batch: &HistoryBatch) -> FoldSummary {
        let transfers: Vec<InboundTransfer> = batch
            .entries
            .iter()
            .flat_map(|(seq, tx)| classify(&self.account, *seq, tx))
            .collect();

        self.ledger.fold_history(batch.upper, &transfers)
    }

    /// One monitoring step
    pub async fn tick(&self) -> AppResult<Option<FoldSummary>> {
        let Some(batch) = self.advance().await? else {
            return Ok(None);
        };

        Ok(Some(self.fold(&batch)))
    }

    /// Poll forever. Failed queries leave the cursor untouched and are
    /// retried on the next tick.
    pub fn start(self: Arc<Self>, poll_interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("👀 Watching history of {}", self.account);

            loop {
                ticker.tick().await;

                match self.tick().await {
                    Ok(Some(summary)) => info!(
                        "📥 History folded up to #{}: {} credited, {} unattributed",
                        summary.sequence, summary.credited, summary.unattributed
                    ),
                    Ok(None) => debug!("No new history for {}", self.account),
                    Err(e) => error!("❌ Failed to get recent account history: {}", e),
                }
            }
        })
    }
}
