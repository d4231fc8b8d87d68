pub mod payout;
pub mod finality;

pub use finality::FinalityWatcher;
pub use payout::{PaymentExecutor, PayoutSettings};
