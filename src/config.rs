use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::ledger::models::{Asset, Deposit};

/// A deposit and the account its payouts go to
#[derive(Debug, Deserialize, Clone)]
pub struct DepositConfig {
    pub id: String,
    pub account: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_signer_url")]
    pub signer_url: String,
    pub payment_account: String,
    #[serde(default)]
    pub signing_keys: Vec<String>,
    pub chain_id: String,
    #[serde(default = "default_payout_amount")]
    pub payout_amount: String,
    #[serde(default = "default_payout_memo")]
    pub payout_memo: String,
    #[serde(default = "default_history_poll_secs")]
    pub history_poll_secs: u64,
    #[serde(default = "default_payout_interval_secs")]
    pub payout_interval_secs: u64,
    #[serde(default = "default_finality_poll_secs")]
    pub finality_poll_secs: u64,
    #[serde(default)]
    pub start_sequence: u32,
    #[serde(default)]
    pub deposits: Vec<DepositConfig>,
}

fn default_rpc_url() -> String {
    "https://testnet.scorum.com".to_string()
}

fn default_signer_url() -> String {
    "http://127.0.0.1:8093".to_string()
}

fn default_payout_amount() -> String {
    "0.000000010 SCR".to_string()
}

fn default_payout_memo() -> String {
    "payout from".to_string()
}

fn default_history_poll_secs() -> u64 {
    10
}

fn default_payout_interval_secs() -> u64 {
    5
}

fn default_finality_poll_secs() -> u64 {
    3
}

impl Config {
    /// `payouts.toml` (or `PAYOUTS_CONFIG_FILE`) overlaid by `PAYOUTS_*` env vars
    pub fn load() -> AppResult<Self> {
        let file = std::env::var("PAYOUTS_CONFIG_FILE").unwrap_or_else(|_| "payouts".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("PAYOUTS")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("signing_keys"),
            )
            .build()?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> AppResult<Self> {
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.payment_account.trim().is_empty() {
            return Err(AppError::Config("payment_account must be set".to_string()));
        }

        if self.signing_keys.is_empty() {
            return Err(AppError::Config("at least one signing key is required".to_string()));
        }

        if self.deposits.is_empty() {
            return Err(AppError::Config("no deposits configured".to_string()));
        }

        let mut seen = HashSet::new();
        for deposit in &self.deposits {
            if !seen.insert(deposit.id.as_str()) {
                return Err(AppError::Config(format!("duplicate deposit id `{}`", deposit.id)));
            }
        }

        let amount = self.payout_amount()?;
        if amount.amount.is_zero() {
            return Err(AppError::Config("payout_amount must be positive".to_string()));
        }

        if self.history_poll_secs == 0 || self.payout_interval_secs == 0 || self.finality_poll_secs == 0 {
            return Err(AppError::Config("poll intervals must be non-zero".to_string()));
        }

        Ok(())
    }

    pub fn payout_amount(&self) -> AppResult<Asset> {
        self.payout_amount
            .parse()
            .map_err(|e| AppError::Config(format!("payout_amount: {}", e)))
    }

    pub fn deposits(&self) -> Vec<Deposit> {
        self.deposits
            .iter()
            .map(|d| Deposit::new(d.id.clone(), d.account.clone()))
            .collect()
    }

    pub fn history_poll_interval(&self) -> Duration {
        Duration::from_secs(self.history_poll_secs)
    }

    pub fn payout_interval(&self) -> Duration {
        Duration::from_secs(self.payout_interval_secs)
    }

    pub fn finality_poll_interval(&self) -> Duration {
        Duration::from_secs(self.finality_poll_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::config::{File, FileFormat};
    use rust_decimal_macros::dec;

    fn parse(toml: &str) -> AppResult<Config> {
        let settings = ::config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Config::from_settings(settings)
    }

    const BASE: &str = r#"
        payment_account = "roselle"
        signing_keys = ["5JwWJ2m2jGG9RPcpDix5AvkDzQZJoZvpUQScsDzzXWAKMs8Q6jH"]
        chain_id = "testnet"

        [[deposits]]
        id = "dep1"
        account = "noelle"

        [[deposits]]
        id = "dep2"
        account = "gina"
    "#;

    #[test]
    fn test_defaults() {
        let config = parse(BASE).unwrap();

        assert_eq!(config.rpc_url, "https://testnet.scorum.com");
        assert_eq!(config.payout_amount().unwrap().amount, dec!(0.00000001));
        assert_eq!(config.payout_memo, "payout from");
        assert_eq!(config.payout_interval(), Duration::from_secs(5));
        assert_eq!(config.finality_poll_interval(), Duration::from_secs(3));
        assert_eq!(config.history_poll_interval(), Duration::from_secs(10));
        assert_eq!(config.deposits().len(), 2);
    }

    #[test]
    fn test_rejects_duplicate_deposits() {
        let toml = format!("{}\n[[deposits]]\nid = \"dep1\"\naccount = \"margy\"\n", BASE);
        assert!(matches!(parse(&toml), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_missing_keys() {
        let toml = BASE.replace(
            r#"signing_keys = ["5JwWJ2m2jGG9RPcpDix5AvkDzQZJoZvpUQScsDzzXWAKMs8Q6jH"]"#,
            "",
        );
        assert!(matches!(parse(&toml), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_payout() {
        let toml = format!("payout_amount = \"0.000000000 SCR\"\n{}", BASE);
        assert!(matches!(parse(&toml), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_payout_finer_than_asset_precision() {
        let toml = format!("payout_amount = \"0.0000000015 SCR\"\n{}", BASE);
        assert!(matches!(parse(&toml), Err(AppError::Config(_))));
    }
}
