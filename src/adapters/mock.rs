//! Scripted in-memory ledger node used by tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::adapters::traits::{LedgerGateway, TransactionSigner, MOST_RECENT};
use crate::error::{AppError, AppResult, GatewayError};
use crate::ledger::models::*;

/// What the next broadcast does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastBehavior {
    /// Accepted into the next block and kept there
    Include,
    /// Network failure before inclusion
    Fail,
    /// Reported as included, but the block that becomes irreversible lacks it
    Reorg,
}

pub struct MockGateway {
    head: Mutex<ChainHead>,
    /// Added to the irreversible block number after every head query
    finality_step: AtomicU32,
    head_failures: AtomicU32,
    history: Mutex<Vec<(u32, HistoricalTransaction)>>,
    history_failures: AtomicU32,
    block_ops: Mutex<HashMap<u32, Vec<Operation>>>,
    broadcast_behavior: Mutex<BroadcastBehavior>,
    broadcasts: Mutex<Vec<SignedTransaction>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            head: Mutex::new(ChainHead {
                head_block_number: 100,
                last_irreversible_block_num: 100,
                time: Utc.with_ymd_and_hms(2018, 4, 5, 12, 0, 0).unwrap(),
            }),
            finality_step: AtomicU32::new(0),
            head_failures: AtomicU32::new(0),
            history: Mutex::new(Vec::new()),
            history_failures: AtomicU32::new(0),
            block_ops: Mutex::new(HashMap::new()),
            broadcast_behavior: Mutex::new(BroadcastBehavior::Include),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_finality_step(self, step: u32) -> Self {
        self.finality_step.store(step, Ordering::SeqCst);
        self
    }

    pub fn set_broadcast_behavior(&self, behavior: BroadcastBehavior) {
        *self.broadcast_behavior.lock() = behavior;
    }

    pub fn fail_next_heads(&self, count: u32) {
        self.head_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_history(&self, count: u32) {
        self.history_failures.store(count, Ordering::SeqCst);
    }

    /// Append a transfer to the watched account's history
    pub fn push_transfer(&self, sequence: u32, from: &str, memo: &str, amount: &str) {
        let op = Operation::Transfer(TransferOperation {
            from: from.to_string(),
            to: "roselle".to_string(),
            amount: amount.parse().unwrap(),
            memo: memo.to_string(),
        });
        self.push_history(sequence, op);
    }

    pub fn push_history(&self, sequence: u32, op: Operation) {
        self.history.lock().push((
            sequence,
            HistoricalTransaction {
                trx_id: format!("trx-{}", sequence),
                block: sequence,
                operations: vec![op],
            },
        ));
    }

    pub fn broadcasts(&self) -> Vec<SignedTransaction> {
        self.broadcasts.lock().clone()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn chain_head(&self) -> AppResult<ChainHead> {
        if Self::take_failure(&self.head_failures) {
            return Err(GatewayError::Transport("connection refused".to_string()).into());
        }

        let mut head = self.head.lock();
        let current = head.clone();
        head.last_irreversible_block_num += self.finality_step.load(Ordering::SeqCst);
        head.head_block_number = head.head_block_number.max(head.last_irreversible_block_num);
        Ok(current)
    }

    async fn block(&self, block_num: u32) -> AppResult<BlockHeader> {
        Ok(BlockHeader {
            previous: format!("{:08x}0a0b0c0d{}", block_num - 1, "00".repeat(12)),
        })
    }

    async fn account_history(
        &self,
        _account: &str,
        from: i64,
        limit: u32,
    ) -> AppResult<Vec<(u32, HistoricalTransaction)>> {
        if Self::take_failure(&self.history_failures) {
            return Err(GatewayError::Transport("timeout".to_string()).into());
        }

        let history = self.history.lock();
        let newest = history.iter().map(|(seq, _)| *seq).max();

        let (lower, upper) = match (from, newest) {
            (_, None) => return Ok(Vec::new()),
            (MOST_RECENT, Some(newest)) => (newest, newest),
            (from, Some(_)) => {
                let upper = from as u32;
                (upper.saturating_sub(limit), upper)
            }
        };

        // Newest first, like the node, so callers must sort
        let mut page: Vec<_> = history
            .iter()
            .filter(|(seq, _)| *seq >= lower && *seq <= upper)
            .cloned()
            .collect();
        page.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(page)
    }

    async fn operations_in_block(
        &self,
        block_num: u32,
        _only_virtual: bool,
    ) -> AppResult<Vec<Operation>> {
        Ok(self
            .block_ops
            .lock()
            .get(&block_num)
            .cloned()
            .unwrap_or_default())
    }

    async fn broadcast_synchronous(&self, tx: &SignedTransaction) -> AppResult<BroadcastReceipt> {
        let behavior = *self.broadcast_behavior.lock();
        if behavior == BroadcastBehavior::Fail {
            return Err(GatewayError::Transport("broadcast connection reset".to_string()).into());
        }

        self.broadcasts.lock().push(tx.clone());

        let block_num = {
            let mut head = self.head.lock();
            head.head_block_number += 1;
            head.head_block_number
        };

        let mut block_ops = self.block_ops.lock();
        let ops = block_ops.entry(block_num).or_default();
        // An unrelated operation sits in every block
        ops.push(Operation::Other {
            kind: "producer_reward".to_string(),
            body: serde_json::json!({"producer": "witness"}),
        });
        if behavior == BroadcastBehavior::Include {
            ops.extend(tx.transaction.operations.iter().cloned());
        }

        Ok(BroadcastReceipt {
            id: format!("tx-{}", block_num),
            block_num,
            trx_num: 0,
            expired: false,
        })
    }
}

/// Signer that attaches a fixed signature, or always fails
pub struct MockSigner {
    pub fail: bool,
}

#[async_trait]
impl TransactionSigner for MockSigner {
    async fn sign(
        &self,
        tx: &Transaction,
        keys: &[String],
        _chain_id: &str,
    ) -> AppResult<SignedTransaction> {
        if self.fail || keys.is_empty() {
            return Err(AppError::Signing("invalid WIF key".to_string()));
        }

        Ok(SignedTransaction {
            transaction: tx.clone(),
            signatures: vec!["1f00".to_string()],
        })
    }
}
