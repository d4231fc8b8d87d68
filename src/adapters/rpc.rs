use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument};

use crate::adapters::traits::LedgerGateway;
use crate::error::{AppResult, GatewayError};
use crate::ledger::models::{
    BlockHeader, BroadcastReceipt, ChainHead, HistoricalTransaction, Operation, SignedTransaction,
};

const DATABASE_API: &str = "database_api";
const ACCOUNT_HISTORY_API: &str = "account_history_api";
const NETWORK_BROADCAST_API: &str = "network_broadcast_api";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Entry of `get_account_history`: one operation of one transaction
#[derive(Debug, Deserialize)]
struct HistoryItem {
    #[serde(default)]
    trx_id: String,
    block: u32,
    op: Operation,
}

/// Entry of `get_ops_in_block`
#[derive(Debug, Deserialize)]
struct AppliedOperation {
    op: Operation,
}

/// Ledger node reached through the `call` JSON-RPC convention over HTTP
pub struct JsonRpcGateway {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcGateway {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, api: &str, method: &str, args: Value) -> AppResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "call",
            "params": [api, method, args],
        });

        debug!("→ {}.{} #{}", api, method, id);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("{}: {:?}", method, e)))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("{}: {:?}", method, e)))?;

        decode_response(method, body)
    }
}

/// Unwrap a JSON-RPC envelope into the typed result
fn decode_response<T: DeserializeOwned>(method: &str, body: Value) -> AppResult<T> {
    let envelope: RpcResponse = serde_json::from_value(body).map_err(|e| GatewayError::Decode {
        method: method.to_string(),
        message: e.to_string(),
    })?;

    if let Some(error) = envelope.error {
        return Err(GatewayError::Rpc {
            method: method.to_string(),
            message: format!("{} (code {})", error.message, error.code),
        }
        .into());
    }

    let result = envelope.result.unwrap_or(Value::Null);
    serde_json::from_value(result).map_err(|e| {
        GatewayError::Decode {
            method: method.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl LedgerGateway for JsonRpcGateway {
    #[instrument(skip(self))]
    async fn chain_head(&self) -> AppResult<ChainHead> {
        self.call(DATABASE_API, "get_dynamic_global_properties", json!([]))
            .await
    }

    #[instrument(skip(self))]
    async fn block(&self, block_num: u32) -> AppResult<BlockHeader> {
        let block: Option<BlockHeader> = self
            .call(DATABASE_API, "get_block", json!([block_num]))
            .await?;

        block.ok_or_else(|| GatewayError::BlockNotFound(block_num).into())
    }

    #[instrument(skip(self))]
    async fn account_history(
        &self,
        account: &str,
        from: i64,
        limit: u32,
    ) -> AppResult<Vec<(u32, HistoricalTransaction)>> {
        let items: Vec<(u32, HistoryItem)> = self
            .call(
                ACCOUNT_HISTORY_API,
                "get_account_history",
                json!([account, from, limit]),
            )
            .await?;

        Ok(items
            .into_iter()
            .map(|(seq, item)| {
                (
                    seq,
                    HistoricalTransaction {
                        trx_id: item.trx_id,
                        block: item.block,
                        operations: vec![item.op],
                    },
                )
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn operations_in_block(
        &self,
        block_num: u32,
        only_virtual: bool,
    ) -> AppResult<Vec<Operation>> {
        let ops: Vec<AppliedOperation> = self
            .call(DATABASE_API, "get_ops_in_block", json!([block_num, only_virtual]))
            .await?;

        Ok(ops.into_iter().map(|applied| applied.op).collect())
    }

    #[instrument(skip(self, tx))]
    async fn broadcast_synchronous(&self, tx: &SignedTransaction) -> AppResult<BroadcastReceipt> {
        self.call(
            NETWORK_BROADCAST_API,
            "broadcast_transaction_synchronous",
            json!([tx]),
        )
        .await
    }
}
