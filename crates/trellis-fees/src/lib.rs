//! trellis-fees
//!
//! Economic gates on anchoring: the minimum-fee computation the writer
//! pays by, the fee verification the observer enforces, and the
//! value-time-lock rules that scale a writer's per-batch operation
//! allowance with its on-ledger stake.

pub mod fee;
pub mod lock;

pub use fee::{minimum_transaction_fee, verify_transaction_fee};
pub use lock::{max_operations_allowed, required_lock_amount, verify_lock};
