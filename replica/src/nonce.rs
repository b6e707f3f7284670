//! Outstanding single-use nonces, per public key.

use std::collections::{BTreeMap, HashMap, VecDeque};

use bftb_crypto::random_u64;
use bftb_types::{Nonce, PublicKey};

/// Nonces a key may hold at once. Older ones are forgotten first.
///
/// More than one lets a client run several operations against the same replica
/// concurrently without one fetch invalidating another's nonce.
pub const MAX_OUTSTANDING_PER_KEY: usize = 8;

/// Keys the table tracks at once unless configured otherwise.
pub const DEFAULT_MAX_KEYS: usize = 65_536;

#[derive(Debug)]
struct Slots {
    /// Issue sequence of the latest nonce for this key.
    last_issued: u64,
    nonces: VecDeque<Nonce>,
}

/// Replica-issued nonces awaiting use.
///
/// A nonce is removed the first time it is presented correctly, so a captured
/// request can never be replayed against this replica. Issuing only needs a
/// valid signature and fresh keys are free, so the number of keys is capped:
/// once full, the key that was issued a nonce least recently loses all of its
/// nonces.
#[derive(Debug)]
pub struct NonceTable {
    outstanding: HashMap<PublicKey, Slots>,
    /// `last_issued` -> key, oldest first.
    by_age: BTreeMap<u64, PublicKey>,
    next_seq: u64,
    max_keys: usize,
}

impl Default for NonceTable {
    fn default() -> Self {
        Self::with_max_keys(DEFAULT_MAX_KEYS)
    }
}

impl NonceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table tracking at most `max_keys` keys (at least one).
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            outstanding: HashMap::new(),
            by_age: BTreeMap::new(),
            next_seq: 0,
            max_keys: max_keys.max(1),
        }
    }

    /// Issue a fresh random nonce bound to `key`.
    pub fn issue(&mut self, key: &PublicKey) -> Nonce {
        if !self.outstanding.contains_key(key) && self.outstanding.len() >= self.max_keys {
            self.evict_oldest_key();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let slots = self.outstanding.entry(key.clone()).or_insert_with(|| Slots {
            last_issued: seq,
            nonces: VecDeque::new(),
        });
        self.by_age.remove(&slots.last_issued);
        slots.last_issued = seq;
        self.by_age.insert(seq, key.clone());

        let nonce = loop {
            let candidate = Nonce(random_u64());
            if !slots.nonces.contains(&candidate) {
                break candidate;
            }
        };
        if slots.nonces.len() == MAX_OUTSTANDING_PER_KEY {
            slots.nonces.pop_front();
        }
        slots.nonces.push_back(nonce);
        nonce
    }

    /// Consume `nonce` for `key`. Returns `false` if it was never issued to
    /// this key, was evicted, or has already been used.
    pub fn consume(&mut self, key: &PublicKey, nonce: Nonce) -> bool {
        let Some(slots) = self.outstanding.get_mut(key) else {
            return false;
        };
        let Some(pos) = slots.nonces.iter().position(|n| *n == nonce) else {
            return false;
        };
        slots.nonces.remove(pos);
        if slots.nonces.is_empty() {
            let last_issued = slots.last_issued;
            self.outstanding.remove(key);
            self.by_age.remove(&last_issued);
        }
        true
    }

    /// Total outstanding nonces across all keys.
    pub fn outstanding(&self) -> usize {
        self.outstanding.values().map(|slots| slots.nonces.len()).sum()
    }

    /// Keys currently holding at least one nonce.
    pub fn keys(&self) -> usize {
        self.outstanding.len()
    }

    fn evict_oldest_key(&mut self) {
        if let Some((_, key)) = self.by_age.pop_first() {
            self.outstanding.remove(&key);
        }
    }
}
