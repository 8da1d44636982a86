//! trellis-files
//!
//! Codecs for the five batch artifacts stored on the CAS — core index,
//! provisional index, core proof, provisional proof, and chunk files —
//! plus the anchor string written to the ledger.
//!
//! Every file is gzip-compressed canonical JSON. Decoding is
//! additive-strict and enforces both the compressed size cap (at fetch
//! time) and the decompressed ratio bound.

pub mod anchor;
pub mod chunk;
pub mod compressor;
pub mod core_index;
pub mod core_proof;
pub mod provisional_index;
pub mod provisional_proof;
pub mod reference;

pub use anchor::AnchoredData;
pub use chunk::ChunkFile;
pub use core_index::CoreIndexFile;
pub use core_proof::CoreProofFile;
pub use provisional_index::ProvisionalIndexFile;
pub use provisional_proof::ProvisionalProofFile;
pub use reference::OperationReference;
