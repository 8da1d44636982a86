//! trellis-store
//!
//! Sled-backed implementations of the engine's three stores: anchored
//! operations, anchor-string confirmations, and unresolvable transactions
//! awaiting retry.

mod confirmation_store;
mod operation_store;
mod unresolvable_store;

pub use confirmation_store::SledConfirmationStore;
pub use operation_store::SledOperationStore;
pub use unresolvable_store::SledUnresolvableTransactionStore;

pub(crate) fn storage_error(e: sled::Error) -> trellis_core::TrellisError {
    trellis_core::TrellisError::Storage(e.to_string())
}

pub(crate) fn serialization_error<E: std::fmt::Display>(e: E) -> trellis_core::TrellisError {
    trellis_core::TrellisError::Serialization(e.to_string())
}
