use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    adapters::{JsonRpcGateway, LedgerGateway, TransactionSigner, WalletSigner},
    config::Config,
    error::AppResult,
    execution::{FinalityWatcher, PaymentExecutor, PayoutSettings},
    funding::HistoryCursor,
    ledger::DepositLedger,
    settlement::PayoutScheduler,
};

/// Everything the agent runs on. Components share the ledger and the node
/// capabilities through explicit `Arc`s; there is no global state.
pub struct PayoutService {
    pub ledger: Arc<DepositLedger>,
    pub cursor: Arc<HistoryCursor>,
    pub scheduler: Arc<PayoutScheduler>,
    config: Config,
}

/// Handles of the two periodic loops
pub struct ServiceHandles {
    pub monitor: JoinHandle<()>,
    pub payouts: JoinHandle<()>,
}

impl ServiceHandles {
    /// Stop both loops. In-flight payouts are abandoned.
    pub fn abort(&self) {
        self.monitor.abort();
        self.payouts.abort();
    }
}

pub fn initialize(config: Config) -> AppResult<PayoutService> {
    let gateway: Arc<dyn LedgerGateway> = Arc::new(JsonRpcGateway::new(config.rpc_url.clone()));
    let signer: Arc<dyn TransactionSigner> = Arc::new(WalletSigner::new(config.signer_url.clone()));

    info!("🔗 Ledger node: {}", config.rpc_url);

    PayoutService::new(config, gateway, signer)
}

impl PayoutService {
    pub fn new(
        config: Config,
        gateway: Arc<dyn LedgerGateway>,
        signer: Arc<dyn TransactionSigner>,
    ) -> AppResult<Self> {
        let amount = config.payout_amount()?;

        let ledger = Arc::new(DepositLedger::new(config.deposits(), config.start_sequence));
        info!("✅ Deposit ledger initialized with {} deposits", config.deposits.len());

        let cursor = Arc::new(HistoryCursor::new(
            config.payment_account.clone(),
            gateway.clone(),
            ledger.clone(),
        ));

        let executor = Arc::new(PaymentExecutor::new(
            gateway.clone(),
            signer,
            ledger.clone(),
            PayoutSettings {
                payment_account: config.payment_account.clone(),
                signing_keys: config.signing_keys.clone(),
                chain_id: config.chain_id.clone(),
                memo: config.payout_memo.clone(),
            },
        ));

        let watcher = Arc::new(FinalityWatcher::new(
            gateway,
            ledger.clone(),
            config.finality_poll_interval(),
        ));

        let scheduler = Arc::new(PayoutScheduler::new(
            ledger.clone(),
            executor,
            watcher,
            amount,
        ));

        Ok(Self {
            ledger,
            cursor,
            scheduler,
            config,
        })
    }

    /// Spawn the history monitor and the payout loop
    pub fn start(&self) -> ServiceHandles {
        let monitor = self.cursor.clone().start(self.config.history_poll_interval());
        let payouts = self.scheduler.clone().start(self.config.payout_interval());

        info!(
            "🚀 Payout agent running for {} (history every {:?}, payouts every {:?})",
            self.config.payment_account,
            self.config.history_poll_interval(),
            self.config.payout_interval()
        );

        ServiceHandles { monitor, payouts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockGateway, MockSigner};
    use crate::config::DepositConfig;
    use rust_decimal_macros::dec;
    use tokio::time::{sleep, Duration};

    fn config() -> Config {
        Config {
            rpc_url: "http://localhost".to_string(),
            signer_url: "http://localhost".to_string(),
            payment_account: "roselle".to_string(),
            signing_keys: vec!["wif".to_string()],
            chain_id: "testnet".to_string(),
            payout_amount: "5.000000000 SCR".to_string(),
            payout_memo: "payout from".to_string(),
            history_poll_secs: 1,
            payout_interval_secs: 3600,
            finality_poll_secs: 1,
            start_sequence: 0,
            deposits: vec![DepositConfig {
                id: "d1".to_string(),
                account: "noelle".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_running_service_folds_history() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_transfer(1, "alice", "d1", "2.500000000 SCR");

        let service =
            PayoutService::new(config(), gateway, Arc::new(MockSigner { fail: false })).unwrap();
        let handles = service.start();

        // Payout amount exceeds anything credited, so only the monitor moves balances
        let mut folded = false;
        for _ in 0..100 {
            if service.ledger.sequence() == 1 {
                folded = true;
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        handles.abort();

        assert!(folded);
        assert_eq!(service.ledger.balance("d1"), Some(dec!(2.5)));
    }
}
