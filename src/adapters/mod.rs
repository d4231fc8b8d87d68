pub mod traits;
pub mod rpc;
pub mod signer;

#[cfg(test)]
pub mod mock;

pub use rpc::JsonRpcGateway;
pub use signer::WalletSigner;
pub use traits::{LedgerGateway, TransactionSigner};
