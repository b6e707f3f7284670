use proptest::prelude::*;

use bftb_types::{BankError, QuorumParams, Transaction, TransactionId, WriteTimestamp};
use bftb_types::PublicKey;

proptest! {
    /// Two quorums always intersect in more than f replicas, so at least one honest
    /// replica is shared between any two certified operations.
    #[test]
    fn quorums_intersect_in_an_honest_replica(faults in 0usize..10, extra in 0usize..10) {
        let replicas = 2 * faults + 1 + extra;
        let params = QuorumParams::new(replicas, faults).unwrap();
        let q = params.quorum_size();
        prop_assert!(2 * q > replicas + faults);
        prop_assert!(q <= replicas);
    }

    /// Fewer than 2f + 1 replicas are always rejected.
    #[test]
    fn undersized_deployments_rejected(faults in 1usize..10, missing in 1usize..10) {
        let required = 2 * faults + 1;
        let replicas = required.saturating_sub(missing);
        prop_assert!(QuorumParams::new(replicas, faults).is_err());
    }

    /// Timestamp ordering follows the wrapped value, and next() is strictly greater.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = WriteTimestamp::new(a);
        let tb = WriteTimestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert!(ta.next() > ta);
    }

    /// Transactions survive bincode unchanged.
    #[test]
    fn transaction_bincode_roundtrip(
        id in 0u64..u64::MAX,
        src in prop::array::uniform32(0u8..),
        dst in prop::array::uniform32(0u8..),
        amount in 1i64..i64::MAX,
    ) {
        let tx = Transaction {
            id: TransactionId(id),
            source: PublicKey(src),
            destination: PublicKey(dst),
            amount,
        };
        let encoded = bincode::serialize(&tx).unwrap();
        let decoded: Transaction = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, tx);
    }
}

#[test]
fn bank_error_json_roundtrip() {
    let err = BankError::Unavailable("disk full".into());
    let json = serde_json::to_string(&err).unwrap();
    let back: BankError = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}

#[test]
fn validation_failures_are_classified() {
    assert!(BankError::ReplayDetected.is_validation_failure());
    assert!(!BankError::InsufficientBalance.is_validation_failure());
}
