//! trellis-queue
//!
//! The writer's durable operation queue: FIFO over a sled tree with a
//! membership index enforcing at most one queued operation per DID.

mod queue;

pub use queue::SledOperationQueue;
