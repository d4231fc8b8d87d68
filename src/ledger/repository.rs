use super::models::*;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Balances plus the history cursor. Both live behind the same lock so that
/// folding a history page and advancing the cursor happen together.
struct LedgerState {
    deposits: HashMap<String, Deposit>,
    sequence: u32,
}

impl LedgerState {
    fn credit(&mut self, deposit_id: &str, amount: Decimal) -> bool {
        match self.deposits.get_mut(deposit_id) {
            Some(deposit) => {
                deposit.balance += amount;
                true
            }
            None => {
                warn!(
                    "⚠️ Unrecognized deposit `{}`, {} left unattributed for manual review",
                    deposit_id, amount
                );
                false
            }
        }
    }
}

/// Outcome of folding one history page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldSummary {
    pub credited: usize,
    pub unattributed: usize,
    pub skipped: usize,
    pub sequence: u32,
}

/// In-memory deposit ledger - THE source of truth for balances
///
/// Every read and write of a balance or of the history sequence goes through
/// one exclusive lock. Nothing here blocks on I/O, so the lock is never held
/// across an await point.
pub struct DepositLedger {
    state: Mutex<LedgerState>,
}

impl DepositLedger {
    pub fn new(deposits: impl IntoIterator<Item = Deposit>, start_sequence: u32) -> Self {
        let deposits = deposits
            .into_iter()
            .map(|deposit| (deposit.id.clone(), deposit))
            .collect();

        Self {
            state: Mutex::new(LedgerState {
                deposits,
                sequence: start_sequence,
            }),
        }
    }

    // ========== BALANCE OPERATIONS ==========

    /// Add funds to a deposit. Unknown ids are logged and ignored.
    pub fn credit(&self, deposit_id: &str, amount: Decimal) -> bool {
        self.state.lock().credit(deposit_id, amount)
    }

    /// Atomically check and subtract. Returns false, leaving the balance
    /// untouched, when the deposit is unknown or holds less than `amount`.
    pub fn try_debit(&self, deposit_id: &str, amount: Decimal) -> bool {
        let mut state = self.state.lock();

        let Some(deposit) = state.deposits.get_mut(deposit_id) else {
            return false;
        };

        if deposit.balance < amount {
            return false;
        }

        deposit.balance -= amount;
        true
    }

    /// Return an optimistic debit to its deposit
    pub fn rollback(&self, deposit_id: &str, amount: Decimal) {
        if self.credit(deposit_id, amount) {
            info!("↩️ Rolled back {} to deposit {}", amount, deposit_id);
        }
    }

    pub fn balance(&self, deposit_id: &str) -> Option<Decimal> {
        self.state
            .lock()
            .deposits
            .get(deposit_id)
            .map(|deposit| deposit.balance)
    }

    pub fn deposit(&self, deposit_id: &str) -> Option<Deposit> {
        self.state.lock().deposits.get(deposit_id).cloned()
    }

    pub fn deposit_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().deposits.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All deposits ordered by id
    pub fn snapshot(&self) -> Vec<Deposit> {
        let mut deposits: Vec<Deposit> = self.state.lock().deposits.values().cloned().collect();
        deposits.sort_by(|a, b| a.id.cmp(&b.id));
        deposits
    }

    // ========== HISTORY OPERATIONS ==========

    /// Highest history sequence already folded
    pub fn sequence(&self) -> u32 {
        self.state.lock().sequence
    }

    /// Fold classified transfers and move the cursor to `upper` in one
    /// critical section. Transfers at or below the current cursor were
    /// already folded and are skipped, so replaying a page is a no-op.
    pub fn fold_history(&self, upper: u32, transfers: &[InboundTransfer]) -> FoldSummary {
        let mut state = self.state.lock();
        let mut summary = FoldSummary {
            sequence: state.sequence,
            ..FoldSummary::default()
        };

        if upper <= state.sequence {
            debug!(
                "History page up to {} already folded (cursor {})",
                upper, state.sequence
            );
            summary.skipped = transfers.len();
            return summary;
        }

        let floor = state.sequence;
        for transfer in transfers {
            if transfer.sequence <= floor || transfer.sequence > upper {
                summary.skipped += 1;
                continue;
            }

            if state.credit(&transfer.memo, transfer.amount.amount) {
                info!(
                    "💰 #{} {} from {} credited to deposit {}",
                    transfer.sequence, transfer.amount, transfer.from, transfer.memo
                );
                summary.credited += 1;
            } else {
                warn!(
                    "#{} transfer of {} from {} carries unknown memo `{}`",
                    transfer.sequence, transfer.amount, transfer.from, transfer.memo
                );
                summary.unattributed += 1;
            }
        }

        state.sequence = upper;
        summary.sequence = upper;
        summary
    }
}
