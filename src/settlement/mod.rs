// Outbound side: periodic payouts from deposit balances
pub mod scheduler;

pub use scheduler::PayoutScheduler;
