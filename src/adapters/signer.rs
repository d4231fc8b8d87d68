use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::adapters::traits::TransactionSigner;
use crate::error::{AppError, AppResult};
use crate::ledger::models::{SignedTransaction, Transaction};

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(default)]
    result: Option<SignedTransaction>,
    #[serde(default)]
    error: Option<SignError>,
}

#[derive(Debug, Deserialize)]
struct SignError {
    message: String,
}

/// Delegates signing to a local wallet daemon (`sign_transaction`)
pub struct WalletSigner {
    url: String,
    client: reqwest::Client,
}

impl WalletSigner {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TransactionSigner for WalletSigner {
    #[instrument(skip(self, tx, keys))]
    async fn sign(
        &self,
        tx: &Transaction,
        keys: &[String],
        chain_id: &str,
    ) -> AppResult<SignedTransaction> {
        if keys.is_empty() {
            return Err(AppError::Signing("No signing keys supplied".to_string()));
        }

        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sign_transaction",
            "params": [tx, keys, chain_id],
        });

        let body: Value = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Signing(format!("Signer unreachable: {:?}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Signing(format!("Malformed signer response: {:?}", e)))?;

        let signed = decode_signed(tx, body)?;

        debug!("✍️ Transaction signed with {} signature(s)", signed.signatures.len());
        Ok(signed)
    }
}

/// Accept the daemon's answer only if it signed exactly `tx`
fn decode_signed(tx: &Transaction, body: Value) -> AppResult<SignedTransaction> {
    let response: SignResponse = serde_json::from_value(body)
        .map_err(|e| AppError::Signing(format!("Malformed signer response: {}", e)))?;

    if let Some(error) = response.error {
        return Err(AppError::Signing(error.message));
    }

    let signed = response
        .result
        .ok_or_else(|| AppError::Signing("Signer returned no transaction".to_string()))?;

    if signed.signatures.is_empty() || signed.transaction != *tx {
        return Err(AppError::Signing(
            "Signer returned an unsigned or altered transaction".to_string(),
        ));
    }

    Ok(signed)
}
