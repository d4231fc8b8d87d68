use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Fractional digits the ledger uses when rendering amounts
pub const ASSET_PRECISION: usize = 9;

/// Amount of a named ledger asset, e.g. `2.500000000 SCR`
///
/// Equality compares the amount numerically, so `0.00000001 SCR` equals
/// `0.000000010 SCR` as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    pub amount: Decimal,
    pub symbol: String,
}

impl Asset {
    pub fn new(amount: Decimal, symbol: impl Into<String>) -> Self {
        Self {
            amount,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.prec$} {}",
            self.amount,
            self.symbol,
            prec = ASSET_PRECISION
        )
    }
}

impl FromStr for Asset {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        let mut parts = s.split_whitespace();
        let (Some(amount), Some(symbol), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AppError::InvalidInput(format!(
                "Asset must be `<amount> <SYMBOL>`, got `{}`",
                s
            )));
        };

        let amount = Decimal::from_str(amount)?;
        if amount.is_sign_negative() {
            return Err(AppError::InvalidInput(format!("Negative asset amount: {}", s)));
        }

        // Anything finer would be truncated when rendered for the node
        if amount.normalize().scale() > ASSET_PRECISION as u32 {
            return Err(AppError::InvalidInput(format!(
                "Asset amount has more than {} fractional digits: {}",
                ASSET_PRECISION, s
            )));
        }

        Ok(Self::new(amount, symbol))
    }
}

impl TryFrom<String> for Asset {
    type Error = AppError;

    fn try_from(value: String) -> AppResult<Self> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

/// Transfer of funds between two ledger accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOperation {
    pub from: String,
    pub to: String,
    pub amount: Asset,
    pub memo: String,
}

/// Ledger operation. Only transfers are modelled; everything else is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOperation", into = "RawOperation")]
pub enum Operation {
    Transfer(TransferOperation),
    Other { kind: String, body: serde_json::Value },
}

pub const TRANSFER_OPERATION: &str = "transfer";

impl Operation {
    pub fn kind(&self) -> &str {
        match self {
            Operation::Transfer(_) => TRANSFER_OPERATION,
            Operation::Other { kind, .. } => kind,
        }
    }
}

/// Wire form: `["<kind>", { ..body.. }]`
#[derive(Serialize, Deserialize)]
struct RawOperation(String, serde_json::Value);

impl TryFrom<RawOperation> for Operation {
    type Error = serde_json::Error;

    fn try_from(RawOperation(kind, body): RawOperation) -> Result<Self, Self::Error> {
        if kind == TRANSFER_OPERATION {
            Ok(Operation::Transfer(serde_json::from_value(body)?))
        } else {
            Ok(Operation::Other { kind, body })
        }
    }
}

impl From<Operation> for RawOperation {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Transfer(transfer) => RawOperation(
                TRANSFER_OPERATION.to_string(),
                // A struct of strings always serializes
                serde_json::to_value(transfer).unwrap_or(serde_json::Value::Null),
            ),
            Operation::Other { kind, body } => RawOperation(kind, body),
        }
    }
}

/// One entry of an account's history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalTransaction {
    pub trx_id: String,
    pub block: u32,
    pub operations: Vec<Operation>,
}

/// Transfer found in the watched account's history, addressed by memo
#[derive(Debug, Clone, PartialEq)]
pub struct InboundTransfer {
    pub sequence: u32,
    pub from: String,
    pub memo: String,
    pub amount: Asset,
}

/// Chain head metadata (dynamic global properties)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainHead {
    pub head_block_number: u32,
    pub last_irreversible_block_num: u32,
    #[serde(with = "node_time")]
    pub time: DateTime<Utc>,
}

impl ChainHead {
    pub fn is_irreversible(&self, block_num: u32) -> bool {
        self.last_irreversible_block_num >= block_num
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hex id of the parent block
    pub previous: String,
}

/// Unsigned transaction bound to a recent block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    #[serde(with = "node_time")]
    pub expiration: DateTime<Utc>,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub extensions: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub signatures: Vec<String>,
}

/// Result of a synchronous broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    pub id: String,
    pub block_num: u32,
    #[serde(default)]
    pub trx_num: u32,
    #[serde(default)]
    pub expired: bool,
}

/// Logical sub-account addressed by transfer memo
#[derive(Debug, Clone, PartialEq)]
pub struct Deposit {
    pub id: String,
    pub account: String,
    pub balance: Decimal,
}

impl Deposit {
    pub fn new(id: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            account: account.into(),
            balance: Decimal::ZERO,
        }
    }
}

impl fmt::Display for Deposit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}: {})", self.id, self.account, self.balance)
    }
}

/// Lifecycle of a broadcast payout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutState {
    WaitingFinality,
    Confirmed,
    RolledBack,
}

impl fmt::Display for PayoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PayoutState::WaitingFinality => "waiting_finality",
            PayoutState::Confirmed => "confirmed",
            PayoutState::RolledBack => "rolled_back",
        };
        write!(f, "{}", s)
    }
}

/// A payout whose amount has already been debited from its deposit
#[derive(Debug, Clone)]
pub struct Payout {
    pub id: Uuid,
    pub deposit_id: String,
    pub account: String,
    pub amount: Asset,
}

/// A payout accepted into a block but not yet irreversible
#[derive(Debug, Clone)]
pub struct PendingTransfer {
    pub payout_id: Uuid,
    pub deposit_id: String,
    pub block_num: u32,
    pub operation: TransferOperation,
}

impl PendingTransfer {
    pub fn amount(&self) -> Decimal {
        self.operation.amount.amount
    }
}

/// Node timestamps carry no offset and are always UTC
pub mod node_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
