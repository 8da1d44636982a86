use serde_json::Value;
use trellis_core::operation::OperationKind;
use trellis_core::types::DidSuffix;
use trellis_core::{ProtocolParameters, TrellisError};

use crate::create::CreateOperation;
use crate::deactivate::DeactivateOperation;
use crate::recover::RecoverOperation;
use crate::update::UpdateOperation;
use crate::validation::{parse_json_object, require_string};

// ── Operation ────────────────────────────────────────────────────────────────

/// A fully validated operation of any kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Create(CreateOperation),
    Update(UpdateOperation),
    Recover(RecoverOperation),
    Deactivate(DeactivateOperation),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create(_) => OperationKind::Create,
            Operation::Update(_) => OperationKind::Update,
            Operation::Recover(_) => OperationKind::Recover,
            Operation::Deactivate(_) => OperationKind::Deactivate,
        }
    }

    pub fn did_suffix(&self) -> &DidSuffix {
        match self {
            Operation::Create(op) => &op.did_suffix,
            Operation::Update(op) => &op.did_suffix,
            Operation::Recover(op) => &op.did_suffix,
            Operation::Deactivate(op) => &op.did_suffix,
        }
    }

    pub fn operation_buffer(&self) -> &[u8] {
        match self {
            Operation::Create(op) => &op.operation_buffer,
            Operation::Update(op) => &op.operation_buffer,
            Operation::Recover(op) => &op.operation_buffer,
            Operation::Deactivate(op) => &op.operation_buffer,
        }
    }

    /// The operation's delta, when one survived validation. Deactivates
    /// never carry one.
    pub fn delta(&self) -> Option<&Value> {
        match self {
            Operation::Create(op) => op.delta.as_ref(),
            Operation::Update(op) => op.delta.as_ref(),
            Operation::Recover(op) => op.delta.as_ref(),
            Operation::Deactivate(_) => None,
        }
    }
}

/// Parse a full operation request, dispatching on its `type` property.
pub fn parse_operation(
    buffer: &[u8],
    params: &ProtocolParameters,
) -> Result<Operation, TrellisError> {
    let object = parse_json_object(buffer, "operation")?;
    let operation_type = require_string(&object, "operation", "type")?;

    match operation_type {
        "create" => Ok(Operation::Create(CreateOperation::parse(buffer, params)?)),
        "update" => Ok(Operation::Update(UpdateOperation::parse(buffer, params)?)),
        "recover" => Ok(Operation::Recover(RecoverOperation::parse(buffer, params)?)),
        "deactivate" => Ok(Operation::Deactivate(DeactivateOperation::parse(
            buffer, params,
        )?)),
        other => Err(TrellisError::OperationTypeUnknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::SuffixData;
    use crate::delta;
    use serde_json::json;
    use trellis_crypto::multihash;

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    #[test]
    fn dispatches_by_type() {
        let create_delta = json!({"patches": []});
        let request = json!({
            "type": "create",
            "suffix_data": {
                "delta_hash": delta::hash(&create_delta).unwrap(),
                "recovery_commitment": multihash::hash_then_encode(b"r"),
            },
            "delta": create_delta,
        });
        let buffer = serde_json::to_vec(&request).unwrap();
        let operation = parse_operation(&buffer, &params()).unwrap();
        assert_eq!(operation.kind(), OperationKind::Create);
        assert_eq!(operation.operation_buffer(), &buffer[..]);
    }

    #[test]
    fn unknown_type_rejected() {
        let buffer = br#"{"type":"revoke"}"#;
        assert!(matches!(
            parse_operation(buffer, &params()),
            Err(TrellisError::OperationTypeUnknown(t)) if t == "revoke"
        ));
    }

    #[test]
    fn missing_type_rejected() {
        let buffer = br#"{"suffix_data":{}}"#;
        assert!(matches!(
            parse_operation(buffer, &params()),
            Err(TrellisError::MissingProperty { .. })
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            parse_operation(b"{not json", &params()),
            Err(TrellisError::JsonNotParsable { .. })
        ));
    }

    #[test]
    fn round_trip_through_serialize_and_parse() {
        // parse(serialize(op)) == op modulo canonicalization: rebuild the
        // request from parsed parts and parse again.
        let create_delta = json!({"patches": [], "update_commitment": "EiAx"});
        let suffix_data = SuffixData {
            delta_hash: delta::hash(&create_delta).unwrap(),
            recovery_commitment: multihash::hash_then_encode(b"rc"),
        };
        let buffer = crate::compose::create_request(&suffix_data, Some(&create_delta)).unwrap();
        let operation = parse_operation(&buffer, &params()).unwrap();

        let Operation::Create(parsed) = operation else {
            panic!("expected create");
        };
        let recomposed =
            crate::compose::create_request(&parsed.suffix_data, parsed.delta.as_ref()).unwrap();
        assert_eq!(recomposed, buffer);
    }
}
