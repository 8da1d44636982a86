//! trellis-observer
//!
//! The reading side of the node: follows the ledger for anchoring
//! transactions, enforces the per-block throughput budget, downloads and
//! validates the referenced CAS files, and materializes anchored
//! operations into the operation store. Transactions whose content is
//! missing are parked in the unresolvable store and retried with
//! exponential backoff.

pub mod download;
pub mod observer;
pub mod processor;
pub mod throughput;

pub use download::DownloadManager;
pub use observer::Observer;
pub use processor::TransactionProcessor;
pub use throughput::ThroughputLimiter;
