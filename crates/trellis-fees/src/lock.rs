use tracing::debug;
use trellis_core::types::{Fee, TransactionTime, ValueTimeLockModel};
use trellis_core::{ProtocolParameters, TrellisError};

/// Stake required to anchor `operation_count` operations:
/// `normalized_fee × per-operation multiplier × operation_count × amount multiplier`.
pub fn required_lock_amount(
    normalized_fee: Fee,
    operation_count: u64,
    params: &ProtocolParameters,
) -> u64 {
    let per_operation_stake = normalized_fee as f64
        * params.normalized_fee_to_per_operation_fee_multiplier
        * params.value_time_lock_amount_multiplier;
    (per_operation_stake * operation_count as f64).ceil() as u64
}

/// Reverse of [`required_lock_amount`]: how many operations a given lock
/// permits. A writer with no lock gets the unlocked allowance.
pub fn max_operations_allowed(
    lock: Option<&ValueTimeLockModel>,
    params: &ProtocolParameters,
) -> u64 {
    let unlocked_allowance = params.max_number_of_operations_for_no_value_time_lock;
    let Some(lock) = lock else {
        return unlocked_allowance;
    };

    let per_operation_stake = lock.normalized_fee as f64
        * params.normalized_fee_to_per_operation_fee_multiplier
        * params.value_time_lock_amount_multiplier;
    if per_operation_stake <= 0.0 {
        return unlocked_allowance;
    }

    let allowed = (lock.amount_locked as f64 / per_operation_stake).floor() as u64;
    allowed.max(unlocked_allowance)
}

/// Observer-side lock verification for a transaction claiming
/// `operation_count` operations at `transaction_time`, written by `writer`.
pub fn verify_lock(
    lock: Option<&ValueTimeLockModel>,
    operation_count: u64,
    transaction_time: TransactionTime,
    writer: &str,
    params: &ProtocolParameters,
) -> Result<(), TrellisError> {
    let Some(lock) = lock else {
        if operation_count > params.max_number_of_operations_for_no_value_time_lock {
            return Err(TrellisError::ValueTimeLockRequired {
                op_count: operation_count,
                max: params.max_number_of_operations_for_no_value_time_lock,
            });
        }
        return Ok(());
    };

    if lock.owner != writer {
        return Err(TrellisError::ValueTimeLockOwnerMismatch {
            owner: lock.owner.clone(),
            writer: writer.to_string(),
        });
    }

    if transaction_time < lock.lock_transaction_time
        || transaction_time >= lock.unlock_transaction_time
    {
        return Err(TrellisError::ValueTimeLockOutsideWindow {
            transaction_time,
            lock_time: lock.lock_transaction_time,
            unlock_time: lock.unlock_transaction_time,
        });
    }

    let required = required_lock_amount(lock.normalized_fee, operation_count, params);
    if lock.amount_locked < required {
        return Err(TrellisError::ValueTimeLockAmountInsufficient {
            amount_locked: lock.amount_locked,
            required,
        });
    }

    debug!(
        lock = %lock.identifier,
        operation_count,
        amount_locked = lock.amount_locked,
        "value time lock verified"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    fn lock(amount_locked: u64) -> ValueTimeLockModel {
        ValueTimeLockModel {
            identifier: "lock-1".to_string(),
            amount_locked,
            lock_transaction_time: 100,
            unlock_transaction_time: 200,
            normalized_fee: 1_000,
            owner: "writer-key".to_string(),
        }
    }

    #[test]
    fn no_lock_allows_the_unlocked_budget_only() {
        assert_eq!(max_operations_allowed(None, &params()), 100);
        verify_lock(None, 100, 150, "writer-key", &params()).unwrap();
        assert!(matches!(
            verify_lock(None, 101, 150, "writer-key", &params()),
            Err(TrellisError::ValueTimeLockRequired { op_count: 101, max: 100 })
        ));
    }

    #[test]
    fn allowance_is_the_reverse_of_the_requirement() {
        // per-operation stake = 1000 × 0.001 × 600 = 600.
        for operation_count in [101u64, 500, 2_000] {
            let required = required_lock_amount(1_000, operation_count, &params());
            assert_eq!(required, operation_count * 600);
            let allowed = max_operations_allowed(Some(&lock(required)), &params());
            assert!(allowed >= operation_count);
            verify_lock(Some(&lock(required)), operation_count, 150, "writer-key", &params())
                .unwrap();
        }
    }

    #[test]
    fn small_locks_still_get_the_unlocked_floor() {
        assert_eq!(max_operations_allowed(Some(&lock(600)), &params()), 100);
    }

    #[test]
    fn owner_must_match_writer() {
        assert!(matches!(
            verify_lock(Some(&lock(600_000)), 500, 150, "someone-else", &params()),
            Err(TrellisError::ValueTimeLockOwnerMismatch { .. })
        ));
    }

    #[test]
    fn transaction_time_must_fall_inside_the_window() {
        let l = lock(600_000);
        assert!(matches!(
            verify_lock(Some(&l), 500, 99, "writer-key", &params()),
            Err(TrellisError::ValueTimeLockOutsideWindow { .. })
        ));
        // The unlock bound is exclusive.
        assert!(matches!(
            verify_lock(Some(&l), 500, 200, "writer-key", &params()),
            Err(TrellisError::ValueTimeLockOutsideWindow { .. })
        ));
        verify_lock(Some(&l), 500, 100, "writer-key", &params()).unwrap();
        verify_lock(Some(&l), 500, 199, "writer-key", &params()).unwrap();
    }

    #[test]
    fn insufficient_stake_rejected() {
        // 500 ops require 300_000 staked.
        assert!(matches!(
            verify_lock(Some(&lock(299_999)), 500, 150, "writer-key", &params()),
            Err(TrellisError::ValueTimeLockAmountInsufficient {
                amount_locked: 299_999,
                required: 300_000,
            })
        ));
    }
}
