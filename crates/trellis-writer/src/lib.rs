//! trellis-writer
//!
//! The anchoring side of the node: drains the operation queue, assembles
//! the batch artifacts onto the CAS, and submits the anchor string to the
//! ledger, gated on confirmations of the previous submission.

pub mod driver;
pub mod writer;

pub use driver::BatchWriterDriver;
pub use writer::BatchWriter;
