// Funding side: detects inbound transfers on the payment account and credits
// the deposit named in their memo
pub mod classifier;
pub mod monitor;

pub use monitor::HistoryCursor;
