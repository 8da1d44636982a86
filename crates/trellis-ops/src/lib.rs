//! trellis-ops
//!
//! Parsing and validation of the four identity-changing request kinds.
//!
//! Parsing is additive-strict: an object must contain exactly the allowed
//! properties for its kind and form, and every property is validated
//! individually on the decoded structure. Two forms exist per kind: the
//! full request a client submits, and the embedded reference form that
//! appears inside index files (no `type`, no `delta`).

pub mod compose;
pub mod create;
pub mod deactivate;
pub mod delta;
pub mod parser;
pub mod recover;
#[cfg(feature = "test_utils")]
pub mod test_utils;
pub mod update;
pub mod validation;

pub use create::{CreateOperation, SuffixData};
pub use deactivate::DeactivateOperation;
pub use parser::{parse_operation, Operation};
pub use recover::RecoverOperation;
pub use update::UpdateOperation;
