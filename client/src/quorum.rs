//! Response tallying: turning per-replica outcomes into a certified value.
//!
//! Verified responses are bucketed by the ledger timestamp each replica
//! reported, then by content within a bucket. Buckets are scanned from the
//! highest timestamp down and the first value held by more than `T` replicas
//! wins. Without a value quorum, more than `T` identical failures form an
//! error quorum; anything else is `QuorumUnavailable`.

use tracing::warn;

use bftb_messages::ReplicaPayload;
use bftb_types::{QuorumParams, WriteTimestamp};

use crate::{ClientError, ReplicaFailure};

/// A value more than `T` replicas agreed on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certified<P> {
    pub payload: P,
    pub timestamp: WriteTimestamp,
    /// Replicas that returned exactly `payload`.
    pub supporters: Vec<usize>,
    /// Every replica that answered, with the timestamp it reported.
    pub reported: Vec<(usize, WriteTimestamp)>,
}

impl<P> Certified<P> {
    /// Replicas that answered with a timestamp older than the certified one.
    pub fn lagging(&self) -> Vec<usize> {
        self.reported
            .iter()
            .filter(|(_, ts)| *ts < self.timestamp)
            .map(|(replica, _)| *replica)
            .collect()
    }
}

/// Outcomes of one round, one per replica.
#[derive(Debug)]
pub struct Tally<P> {
    params: QuorumParams,
    responses: Vec<(usize, P)>,
    failures: Vec<(usize, ReplicaFailure)>,
}

impl<P: ReplicaPayload + PartialEq> Tally<P> {
    pub fn new(params: QuorumParams) -> Self {
        Self {
            params,
            responses: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, replica: usize, outcome: Result<P, ReplicaFailure>) {
        match outcome {
            Ok(payload) => self.responses.push((replica, payload)),
            Err(failure) => self.failures.push((replica, failure)),
        }
    }

    /// Verified responses gathered so far.
    pub fn received(&self) -> usize {
        self.responses.len()
    }

    /// Highest timestamp bucket holding a value quorum, if any.
    pub fn certify(&self) -> Option<Certified<P>>
    where
        P: Clone,
    {
        let mut timestamps: Vec<WriteTimestamp> =
            self.responses.iter().map(|(_, p)| p.timestamp()).collect();
        timestamps.sort_unstable_by(|a, b| b.cmp(a));
        timestamps.dedup();

        for ts in timestamps {
            let bucket: Vec<&(usize, P)> = self
                .responses
                .iter()
                .filter(|(_, p)| p.timestamp() == ts)
                .collect();
            if !self.params.is_quorum(bucket.len()) {
                continue;
            }
            for (_, candidate) in &bucket {
                let supporters: Vec<usize> = bucket
                    .iter()
                    .filter(|(_, p)| p == candidate)
                    .map(|(replica, _)| *replica)
                    .collect();
                if self.params.is_quorum(supporters.len()) {
                    return Some(Certified {
                        payload: candidate.clone(),
                        timestamp: ts,
                        supporters,
                        reported: self
                            .responses
                            .iter()
                            .map(|(replica, p)| (*replica, p.timestamp()))
                            .collect(),
                    });
                }
            }
        }
        None
    }

    /// A failure shared, by description, by more than `T` replicas.
    pub fn error_quorum(&self) -> Option<&ReplicaFailure> {
        let descriptions: Vec<String> = self.failures.iter().map(|(_, f)| f.to_string()).collect();
        descriptions.iter().enumerate().find_map(|(i, d)| {
            let count = descriptions.iter().filter(|other| *other == d).count();
            self.params.is_quorum(count).then(|| &self.failures[i].1)
        })
    }

    /// The certified value, or the error the round amounts to.
    pub fn finish(self) -> Result<Certified<P>, ClientError>
    where
        P: Clone,
    {
        if let Some(certified) = self.certify() {
            return Ok(certified);
        }
        if let Some(failure) = self.error_quorum() {
            return Err(failure.clone().into());
        }
        warn!(
            received = self.responses.len(),
            failed = self.failures.len(),
            total = self.params.replicas(),
            "no quorum"
        );
        Err(ClientError::QuorumUnavailable {
            received: self.responses.len(),
            total: self.params.replicas(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bftb_messages::CheckAccountResponse;
    use bftb_types::BankError;
    use proptest::prelude::*;

    fn params(n: usize, f: usize) -> QuorumParams {
        QuorumParams::new(n, f).unwrap()
    }

    fn response(balance: i64, ts: u64) -> CheckAccountResponse {
        CheckAccountResponse {
            balance,
            pending_credits: vec![],
            timestamp: WriteTimestamp::new(ts),
        }
    }

    #[test]
    fn agreeing_majority_is_certified() {
        let mut tally = Tally::new(params(4, 1));
        tally.record(0, Ok(response(50, 3)));
        tally.record(1, Ok(response(50, 3)));
        tally.record(2, Ok(response(50, 3)));
        tally.record(3, Ok(response(9999, 3)));
        let certified = tally.finish().unwrap();
        assert_eq!(certified.payload.balance, 50);
        assert_eq!(certified.supporters, vec![0, 1, 2]);
    }

    #[test]
    fn highest_qualifying_bucket_wins() {
        // T = 4: five agreeing replicas are needed.
        let mut tally = Tally::new(params(9, 0));
        for i in 0..5 {
            tally.record(i, Ok(response(40, 2)));
        }
        for i in 5..9 {
            tally.record(i, Ok(response(50, 1)));
        }
        let certified = tally.finish().unwrap();
        assert_eq!(certified.timestamp, WriteTimestamp::new(2));
        assert_eq!(certified.lagging(), vec![5, 6, 7, 8]);
    }

    #[test]
    fn later_bucket_preferred_when_both_qualify() {
        // Two qualifying buckets need more answers than there are replicas;
        // record them anyway to pin the scan order.
        let mut tally = Tally::new(params(9, 0));
        for i in 0..5 {
            tally.record(i, Ok(response(50, 1)));
        }
        for i in 0..5 {
            tally.record(i, Ok(response(45, 2)));
        }
        assert_eq!(tally.certify().unwrap().payload.balance, 45);
    }

    #[test]
    fn split_values_in_one_bucket_do_not_certify() {
        let mut tally = Tally::new(params(4, 1));
        tally.record(0, Ok(response(50, 1)));
        tally.record(1, Ok(response(50, 1)));
        tally.record(2, Ok(response(51, 1)));
        tally.record(3, Ok(response(51, 1)));
        assert_eq!(
            tally.finish(),
            Err(ClientError::QuorumUnavailable {
                received: 4,
                total: 4
            })
        );
    }

    #[test]
    fn identical_rejections_form_an_error_quorum() {
        let mut tally: Tally<CheckAccountResponse> = Tally::new(params(4, 1));
        for i in 0..3 {
            tally.record(i, Err(ReplicaFailure::Rejected(BankError::AccountNotFound)));
        }
        tally.record(3, Ok(response(50, 1)));
        assert_eq!(tally.finish(), Err(ClientError::Rejected(BankError::AccountNotFound)));
    }

    #[test]
    fn mixed_failures_are_quorum_unavailable() {
        let mut tally: Tally<CheckAccountResponse> = Tally::new(params(4, 1));
        tally.record(0, Err(ReplicaFailure::Rejected(BankError::AccountNotFound)));
        tally.record(1, Err(ReplicaFailure::Transport("refused".into())));
        tally.record(2, Err(ReplicaFailure::ForgedResponse));
        tally.record(3, Ok(response(50, 1)));
        assert_eq!(
            tally.finish(),
            Err(ClientError::QuorumUnavailable {
                received: 1,
                total: 4
            })
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// Whatever the answers, a certified value is backed by more than T
        /// replicas reporting that exact payload.
        #[test]
        fn certified_values_always_have_quorum_support(
            f in 0usize..3,
            extra in 0usize..4,
            answers in proptest::collection::vec((0i64..3, 0u64..3, any::<bool>()), 1..12),
        ) {
            let n = 2 * f + 1 + extra;
            let p = params(n, f);
            let mut tally = Tally::new(p);
            let mut recorded = Vec::new();
            for (i, (balance, ts, ok)) in answers.into_iter().take(n).enumerate() {
                if ok {
                    recorded.push(response(balance, ts));
                    tally.record(i, Ok(response(balance, ts)));
                } else {
                    tally.record(i, Err(ReplicaFailure::Timeout(std::time::Duration::from_secs(1))));
                }
            }
            if let Some(certified) = tally.certify() {
                let support = recorded.iter().filter(|r| **r == certified.payload).count();
                prop_assert!(support > p.threshold());
                prop_assert_eq!(support, certified.supporters.len());
            }
        }
    }
}
