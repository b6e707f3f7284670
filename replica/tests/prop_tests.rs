use proptest::prelude::*;

use bftb_replica::{NonceTable, MAX_OUTSTANDING_PER_KEY};
use bftb_types::{Nonce, PublicKey};

#[derive(Debug, Clone)]
enum Op {
    Issue(u8),
    /// Present the `n`th nonce issued so far, under key `key`.
    Present { n: usize, key: u8 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Issue),
        (0usize..64, 0u8..6).prop_map(|(n, key)| Op::Present { n, key }),
    ]
}

fn key(b: u8) -> PublicKey {
    PublicKey([b; 32])
}

proptest! {
    /// However issues and presentations interleave, a nonce is accepted at most
    /// once, and only under the key it was issued to.
    #[test]
    fn nonce_accepted_at_most_once(ops in prop::collection::vec(op(), 1..200)) {
        let mut table = NonceTable::new();
        let mut issued: Vec<(u8, Nonce)> = Vec::new();
        let mut accepted: Vec<bool> = Vec::new();

        for op in ops {
            match op {
                Op::Issue(k) => {
                    issued.push((k, table.issue(&key(k))));
                    accepted.push(false);
                }
                Op::Present { n, key: k } => {
                    if issued.is_empty() {
                        continue;
                    }
                    let n = n % issued.len();
                    let (owner, nonce) = issued[n];
                    if table.consume(&key(k), nonce) {
                        prop_assert_eq!(owner, k);
                        prop_assert!(!accepted[n], "nonce {} accepted twice", n);
                        accepted[n] = true;
                    }
                }
            }
        }
    }

    /// The table never holds more keys than configured, nor more nonces than
    /// those keys may carry.
    #[test]
    fn table_size_is_bounded(
        max_keys in 1usize..8,
        keys in prop::collection::vec(any::<u8>(), 1..300),
    ) {
        let mut table = NonceTable::with_max_keys(max_keys);
        for k in keys {
            table.issue(&key(k));
            prop_assert!(table.keys() <= max_keys);
            prop_assert!(table.outstanding() <= max_keys * MAX_OUTSTANDING_PER_KEY);
        }
    }
}
