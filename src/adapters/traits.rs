use async_trait::async_trait;
use crate::error::AppResult;
use crate::ledger::models::{
    BlockHeader, BroadcastReceipt, ChainHead, HistoricalTransaction, Operation, SignedTransaction,
    Transaction,
};

/// Passing this as `from` asks for the most recent history entry
pub const MOST_RECENT: i64 = -1;

/// Read and broadcast capabilities of a ledger node
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Irreversible block number and current chain time
    async fn chain_head(&self) -> AppResult<ChainHead>;

    async fn block(&self, block_num: u32) -> AppResult<BlockHeader>;

    /// History entries of `account` ending at `from` (inclusive) and reaching
    /// `limit` entries further back. Result order is not guaranteed.
    async fn account_history(
        &self,
        account: &str,
        from: i64,
        limit: u32,
    ) -> AppResult<Vec<(u32, HistoricalTransaction)>>;

    async fn operations_in_block(
        &self,
        block_num: u32,
        only_virtual: bool,
    ) -> AppResult<Vec<Operation>>;

    /// Blocks until the transaction is included in a block
    async fn broadcast_synchronous(&self, tx: &SignedTransaction) -> AppResult<BroadcastReceipt>;
}

/// Produces ready-to-broadcast transactions. Key handling and byte-level
/// serialization stay behind this trait.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(
        &self,
        tx: &Transaction,
        keys: &[String],
        chain_id: &str,
    ) -> AppResult<SignedTransaction>;
}
