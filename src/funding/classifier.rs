use tracing::{debug, info};

use crate::ledger::models::{HistoricalTransaction, InboundTransfer, Operation};

/// Pick the transfers into `account` out of one history entry.
///
/// The memo is carried verbatim; matching it against deposits is the
/// ledger's job. Outgoing transfers (our own payouts) and every other
/// operation kind are ignored.
pub fn classify(account: &str, sequence: u32, tx: &HistoricalTransaction) -> Vec<InboundTransfer> {
    tx.operations
        .iter()
        .filter_map(|op| match op {
            Operation::Transfer(transfer) if transfer.to == account => Some(InboundTransfer {
                sequence,
                from: transfer.from.clone(),
                memo: transfer.memo.clone(),
                amount: transfer.amount.clone(),
            }),
            Operation::Transfer(transfer) => {
                info!(
                    "#{} outgoing transfer of {} to {} (memo `{}`) is not a deposit",
                    sequence, transfer.amount, transfer.to, transfer.memo
                );
                None
            }
            other => {
                debug!(
                    "#{} operation {} in {} (block {}) ignored",
                    sequence,
                    other.kind(),
                    tx.trx_id,
                    tx.block
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{Asset, TransferOperation};
    use rust_decimal_macros::dec;

    fn transfer(from: &str, to: &str, memo: &str) -> Operation {
        Operation::Transfer(TransferOperation {
            from: from.to_string(),
            to: to.to_string(),
            amount: Asset::new(dec!(2.5), "SCR"),
            memo: memo.to_string(),
        })
    }

    #[test]
    fn test_classify_inbound_transfers_only() {
        let tx = HistoricalTransaction {
            trx_id: "abc".to_string(),
            block: 10,
            operations: vec![
                transfer("alice", "roselle", "d1"),
                Operation::Other {
                    kind: "vote".to_string(),
                    body: serde_json::json!({}),
                },
                transfer("roselle", "noelle", "payout from"),
            ],
        };

        let inbound = classify("roselle", 4, &tx);

        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].sequence, 4);
        assert_eq!(inbound[0].from, "alice");
        assert_eq!(inbound[0].memo, "d1");
        assert_eq!(inbound[0].amount.amount, dec!(2.5));
    }

    #[test]
    fn test_memo_is_not_normalized() {
        let tx = HistoricalTransaction {
            trx_id: "abc".to_string(),
            block: 10,
            operations: vec![transfer("alice", "roselle", " D1 ")],
        };

        assert_eq!(classify("roselle", 1, &tx)[0].memo, " D1 ");
    }
}
