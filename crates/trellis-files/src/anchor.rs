use trellis_core::{ProtocolParameters, TrellisError};

use crate::reference::validate_cas_uri;

/// The ledger payload binding a batch to its core index file:
/// `"<numberOfOperations>.<coreIndexFileUri>"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchoredData {
    pub number_of_operations: u64,
    pub core_index_file_uri: String,
}

impl AnchoredData {
    /// Wire form, a single `.` delimiter between count and URI.
    pub fn serialize(&self) -> String {
        format!("{}.{}", self.number_of_operations, self.core_index_file_uri)
    }

    /// Parse and validate an anchor string read from the ledger.
    pub fn deserialize(
        anchor_string: &str,
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        let mut parts = anchor_string.split('.');
        let (count_text, uri) = match (parts.next(), parts.next(), parts.next()) {
            (Some(count), Some(uri), None) => (count, uri),
            _ => {
                return Err(TrellisError::AnchoredDataIncorrectFormat(
                    anchor_string.to_string(),
                ))
            }
        };

        // `^[1-9][0-9]*$`: positive decimal without leading zeros.
        let valid_shape = count_text
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_digit() && first != '0')
            && count_text.chars().all(|c| c.is_ascii_digit());
        if !valid_shape {
            return Err(TrellisError::AnchoredDataNumberOfOperationsNotPositiveInteger(
                count_text.to_string(),
            ));
        }

        let number_of_operations: u64 = count_text.parse().map_err(|_| {
            TrellisError::AnchoredDataNumberOfOperationsGreaterThanMax {
                got: u64::MAX,
                max: params.max_operations_per_batch,
            }
        })?;
        if number_of_operations > params.max_operations_per_batch {
            return Err(TrellisError::AnchoredDataNumberOfOperationsGreaterThanMax {
                got: number_of_operations,
                max: params.max_operations_per_batch,
            });
        }

        validate_cas_uri(uri, params)?;

        Ok(Self {
            number_of_operations,
            core_index_file_uri: uri.to_string(),
        })
    }
}
