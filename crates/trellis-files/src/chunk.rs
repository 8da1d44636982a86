use serde_json::{json, Value};
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_ops::create::CreateOperation;
use trellis_ops::recover::RecoverOperation;
use trellis_ops::update::UpdateOperation;
use trellis_ops::validation::{ensure_allowed_properties, parse_json_object, require_array};

use crate::compressor;

/// The batch's payload file: one delta per create, recover, and update
/// operation, in that order, positionally aligned with the index files.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkFile {
    pub deltas: Vec<Value>,
}

impl ChunkFile {
    /// Assemble and gzip the chunk file from the batch's operations,
    /// in create → recover → update order.
    ///
    /// An operation whose delta was pruned contributes an empty object so
    /// that positional alignment with the index files is preserved.
    pub fn build(
        creates: &[CreateOperation],
        recovers: &[RecoverOperation],
        updates: &[UpdateOperation],
    ) -> Result<Vec<u8>, TrellisError> {
        let mut deltas: Vec<Value> = Vec::with_capacity(creates.len() + recovers.len() + updates.len());
        deltas.extend(creates.iter().map(|op| op.delta.clone().unwrap_or_else(|| json!({}))));
        deltas.extend(recovers.iter().map(|op| op.delta.clone().unwrap_or_else(|| json!({}))));
        deltas.extend(updates.iter().map(|op| op.delta.clone().unwrap_or_else(|| json!({}))));
        let serialized = serde_json::to_vec(&json!({ "deltas": deltas }))
            .map_err(|e| TrellisError::Serialization(e.to_string()))?;
        compressor::compress(&serialized)
    }

    /// Decompress, decode, and strictly validate a fetched chunk file.
    pub fn parse(
        compressed: &[u8],
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        let max_decompressed = params.max_decompressed_size(params.max_chunk_file_size_in_bytes);
        let content = compressor::decompress(compressed, max_decompressed)?;
        let root = parse_json_object(&content, "chunk file")?;
        ensure_allowed_properties(&root, "chunk file", &["deltas"])?;

        let deltas = require_array(&root, "chunk file", "deltas")?;
        for delta in &deltas {
            if !delta.is_object() {
                return Err(TrellisError::NotAnObject("chunk file.deltas".into()));
            }
        }
        Ok(Self { deltas })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    #[test]
    fn parse_round_trip() {
        let value = json!({"deltas": [{"patches": []}, {}]});
        let compressed =
            compressor::compress(&serde_json::to_vec(&value).unwrap()).unwrap();
        let file = ChunkFile::parse(&compressed, &params()).unwrap();
        assert_eq!(file.deltas.len(), 2);
        assert_eq!(file.deltas[0], json!({"patches": []}));
    }

    #[test]
    fn non_object_delta_rejected() {
        let value = json!({"deltas": ["string delta"]});
        let compressed =
            compressor::compress(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert!(matches!(
            ChunkFile::parse(&compressed, &params()),
            Err(TrellisError::NotAnObject(_))
        ));
    }

    #[test]
    fn unknown_property_rejected() {
        let value = json!({"deltas": [], "map_file": "QmX"});
        let compressed =
            compressor::compress(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert!(matches!(
            ChunkFile::parse(&compressed, &params()),
            Err(TrellisError::UnexpectedProperty { .. })
        ));
    }

    #[test]
    fn missing_deltas_rejected() {
        let compressed = compressor::compress(b"{}").unwrap();
        assert!(matches!(
            ChunkFile::parse(&compressed, &params()),
            Err(TrellisError::MissingProperty { .. })
        ));
    }
}
