use trellis_core::types::Fee;
use trellis_core::{ProtocolParameters, TrellisError};

/// The minimum fee a writer must pay to anchor `operation_count`
/// operations at the given normalized fee:
/// `max(normalized_fee, normalized_fee × factor × operation_count)`.
pub fn minimum_transaction_fee(
    normalized_fee: Fee,
    operation_count: u64,
    params: &ProtocolParameters,
) -> Result<Fee, TrellisError> {
    if operation_count == 0 {
        return Err(TrellisError::OperationCountLessThanZero(0));
    }
    let per_operation_fee =
        normalized_fee as f64 * params.normalized_to_per_operation_fee_factor;
    let fee_for_all_operations = per_operation_fee * operation_count as f64;
    Ok(fee_for_all_operations.max(normalized_fee as f64).ceil() as Fee)
}

/// Observer-side check that a transaction paid enough for the operations
/// it claims.
pub fn verify_transaction_fee(
    fee_paid: Fee,
    operation_count: u64,
    normalized_fee: Fee,
    params: &ProtocolParameters,
) -> Result<(), TrellisError> {
    if operation_count == 0 {
        return Err(TrellisError::OperationCountLessThanZero(0));
    }
    if fee_paid < normalized_fee {
        return Err(TrellisError::TransactionFeePaidLessThanNormalizedFee {
            fee_paid,
            normalized_fee,
        });
    }

    let per_operation_fee_paid = fee_paid as f64 / operation_count as f64;
    let required_per_operation =
        normalized_fee as f64 * params.normalized_to_per_operation_fee_factor;
    if per_operation_fee_paid < required_per_operation {
        return Err(TrellisError::TransactionFeePaidInvalid {
            fee_paid,
            op_count: operation_count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    #[test]
    fn small_batches_pay_the_normalized_fee_floor() {
        // factor 0.001: one operation costs far less than the normalized
        // fee, so the floor dominates.
        assert_eq!(minimum_transaction_fee(1_000, 1, &params()).unwrap(), 1_000);
    }

    #[test]
    fn large_batches_pay_per_operation() {
        // 1000 fee × 0.001 × 5000 ops = 5000.
        assert_eq!(
            minimum_transaction_fee(1_000, 5_000, &params()).unwrap(),
            5_000
        );
    }

    #[test]
    fn zero_operations_is_a_hard_error() {
        assert!(matches!(
            minimum_transaction_fee(1_000, 0, &params()),
            Err(TrellisError::OperationCountLessThanZero(0))
        ));
        assert!(matches!(
            verify_transaction_fee(1_000, 0, 1_000, &params()),
            Err(TrellisError::OperationCountLessThanZero(0))
        ));
    }

    #[test]
    fn fee_below_normalized_rejected() {
        assert!(matches!(
            verify_transaction_fee(999, 1, 1_000, &params()),
            Err(TrellisError::TransactionFeePaidLessThanNormalizedFee {
                fee_paid: 999,
                normalized_fee: 1_000,
            })
        ));
    }

    #[test]
    fn per_operation_shortfall_rejected() {
        // 2000 ops at normalized 1000 require 1000×0.001×2000 = 2000 paid;
        // 1500 passes the normalized floor but not the per-operation rate.
        assert!(matches!(
            verify_transaction_fee(1_500, 2_000, 1_000, &params()),
            Err(TrellisError::TransactionFeePaidInvalid {
                fee_paid: 1_500,
                op_count: 2_000,
            })
        ));
        verify_transaction_fee(2_000, 2_000, 1_000, &params()).unwrap();
    }

    #[test]
    fn computed_minimum_always_verifies() {
        for (normalized_fee, operation_count) in
            [(1u64, 1u64), (1_000, 100), (777, 9_999), (5, 10_000)]
        {
            let minimum =
                minimum_transaction_fee(normalized_fee, operation_count, &params()).unwrap();
            verify_transaction_fee(minimum, operation_count, normalized_fee, &params()).unwrap();
        }
    }
}
